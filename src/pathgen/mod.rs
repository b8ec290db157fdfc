//! Folder name sanitization and qBittorrent save path construction

mod sanitizer;
pub mod types;

pub use sanitizer::{sanitize_folder_name, validate_folder_name};
pub use types::{FilesystemMode, FolderNameError, NormalizedTitle, Sanitized, MAX_NAME_LENGTH};

use crate::season::SeasonContext;
use tracing::debug;

/// Turn a raw title into a folder name for `mode`.
///
/// With `auto_sanitize` off an invalid name is handed back as-is with
/// `is_valid == false`; with it on the cleaned name is returned and `changed`
/// signals that the caller should tell the user.
pub fn normalize_title(raw: &str, mode: FilesystemMode, auto_sanitize: bool) -> NormalizedTitle {
    let trimmed = raw.trim();

    match validate_folder_name(trimmed, mode) {
        Ok(()) => NormalizedTitle {
            folder_name: trimmed.to_string(),
            is_valid: true,
            error: None,
            changed: false,
        },
        Err(e) if auto_sanitize => {
            let sanitized = sanitize_folder_name(trimmed, mode);
            debug!(
                title = %trimmed,
                folder = %sanitized.name,
                reason = %e,
                "Sanitized folder name"
            );
            let verdict = validate_folder_name(&sanitized.name, mode);
            NormalizedTitle {
                folder_name: sanitized.name,
                is_valid: verdict.is_ok(),
                error: verdict.err().map(|e| e.to_string()),
                changed: sanitized.changed,
            }
        }
        Err(e) => NormalizedTitle {
            folder_name: trimmed.to_string(),
            is_valid: false,
            error: Some(e.to_string()),
            changed: false,
        },
    }
}

/// Convert backslashes to `/` and collapse separator runs, keeping a leading UNC `//`
pub fn normalize_separators(path: &str) -> String {
    let replaced = path.replace('\\', "/");
    let unc = replaced.starts_with("//");

    let mut out = String::with_capacity(replaced.len());
    let mut prev_slash = false;
    for c in replaced.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        out.push(c);
    }

    if unc {
        out.insert(0, '/');
    }
    out
}

/// Join base path, optional season segment and folder into a save path.
///
/// An empty base yields only the folder.
pub fn build_save_path(base: &str, season: Option<&SeasonContext>, folder: &str) -> String {
    let base = normalize_separators(base.trim());
    let folder = folder.trim_matches(|c| c == '/' || c == '\\');

    let mut path = if base.is_empty() {
        String::new()
    } else if base.chars().all(|c| c == '/') {
        base
    } else {
        base.trim_end_matches('/').to_string()
    };

    if let Some(ctx) = season {
        push_segment(&mut path, &ctx.label());
    }
    push_segment(&mut path, folder);

    path
}

fn push_segment(path: &mut String, segment: &str) {
    if segment.is_empty() {
        return;
    }
    if !path.is_empty() && !path.ends_with('/') {
        path.push('/');
    }
    path.push_str(segment);
}

/// True when any segment of `path` is `..`
pub fn has_path_traversal(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment.trim() == "..")
}

fn is_drive_prefix(segment: &str) -> bool {
    let bytes = segment.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Validate a full save path: no traversal, and every segment a valid folder name.
///
/// A leading drive letter (`C:`) is accepted. An empty path means "server default"
/// and is valid.
pub fn validate_save_path(path: &str, mode: FilesystemMode) -> Result<(), FolderNameError> {
    if path.trim().is_empty() {
        return Ok(());
    }

    if has_path_traversal(path) {
        return Err(FolderNameError::PathTraversal);
    }

    let normalized = normalize_separators(path);
    for (i, segment) in normalized.split('/').enumerate() {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if i == 0 && is_drive_prefix(segment) {
            continue;
        }
        validate_folder_name(segment, mode).map_err(|reason| FolderNameError::InvalidSegment {
            segment: segment.to_string(),
            reason: Box::new(reason),
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::season::Season;

    #[test]
    fn test_normalize_title_valid() {
        let result = normalize_title("  Frieren  ", FilesystemMode::Windows, true);
        assert_eq!(result.folder_name, "Frieren");
        assert!(result.is_valid);
        assert!(result.error.is_none());
        assert!(!result.changed);
    }

    #[test]
    fn test_normalize_title_without_auto_sanitize() {
        let result = normalize_title("Re:Zero", FilesystemMode::Windows, false);
        assert_eq!(result.folder_name, "Re:Zero");
        assert!(!result.is_valid);
        assert!(result.error.as_deref().unwrap().contains("invalid characters"));
        assert!(!result.changed);
    }

    #[test]
    fn test_normalize_title_with_auto_sanitize() {
        let result = normalize_title("Title: Subtitle", FilesystemMode::Windows, true);
        assert_eq!(result.folder_name, "Title - Subtitle");
        assert!(result.is_valid);
        assert!(result.changed);
    }

    #[test]
    fn test_build_save_path_with_season() {
        let ctx = SeasonContext::new(Season::Fall, 2025);
        assert_eq!(
            build_save_path("/downloads/anime/", Some(&ctx), "Frieren"),
            "/downloads/anime/Fall 2025/Frieren"
        );
    }

    #[test]
    fn test_build_save_path_empty_base() {
        assert_eq!(build_save_path("", None, "Frieren"), "Frieren");
        assert_eq!(build_save_path("   ", None, "Frieren"), "Frieren");
    }

    #[test]
    fn test_build_save_path_windows_base() {
        assert_eq!(
            build_save_path("D:\\Anime\\\\Seasonal\\", None, "Dandadan"),
            "D:/Anime/Seasonal/Dandadan"
        );
    }

    #[test]
    fn test_build_save_path_root_and_unc() {
        assert_eq!(build_save_path("/", None, "Show"), "/Show");
        assert_eq!(
            build_save_path("\\\\nas\\media", None, "Show"),
            "//nas/media/Show"
        );
    }

    #[test]
    fn test_has_path_traversal() {
        assert!(has_path_traversal("/downloads/../etc"));
        assert!(has_path_traversal("..\\secret"));
        assert!(!has_path_traversal("/downloads/Show..Name"));
        assert!(!has_path_traversal("/downloads/anime"));
    }

    #[test]
    fn test_validate_save_path() {
        assert!(validate_save_path("", FilesystemMode::Windows).is_ok());
        assert!(validate_save_path("C:\\Anime\\Show", FilesystemMode::Windows).is_ok());
        assert_eq!(
            validate_save_path("/data/../root", FilesystemMode::Posix),
            Err(FolderNameError::PathTraversal)
        );

        let err = validate_save_path("D:/Anime/Re:Zero", FilesystemMode::Windows).unwrap_err();
        assert!(matches!(err, FolderNameError::InvalidSegment { ref segment, .. } if segment == "Re:Zero"));

        assert!(validate_save_path("/data/Re:Zero", FilesystemMode::Posix).is_ok());
    }
}
