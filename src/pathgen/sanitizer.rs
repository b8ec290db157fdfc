use super::types::{
    FilesystemMode, FolderNameError, Sanitized, MAX_NAME_LENGTH, WINDOWS_INVALID_CHARS,
    WINDOWS_RESERVED_NAMES,
};

/// Placeholder for names that sanitize down to nothing
const REPLACEMENT: char = '_';

fn is_invalid_char(c: char, mode: FilesystemMode) -> bool {
    if c.is_control() {
        return true;
    }
    match mode {
        FilesystemMode::Posix => c == '/',
        FilesystemMode::Windows => WINDOWS_INVALID_CHARS.contains(&c),
    }
}

fn reserved_base(name: &str) -> Option<String> {
    let base = name.split('.').next().unwrap_or("").trim_end().to_uppercase();
    if WINDOWS_RESERVED_NAMES.contains(&base.as_str()) {
        Some(base)
    } else {
        None
    }
}

/// Check a single folder name against the rules of `mode`
pub fn validate_folder_name(name: &str, mode: FilesystemMode) -> Result<(), FolderNameError> {
    if name.is_empty() {
        return Err(FolderNameError::Empty);
    }

    if name == "." || name == ".." {
        return Err(FolderNameError::DotName);
    }

    let mut invalid: Vec<char> = Vec::new();
    for c in name.chars() {
        if is_invalid_char(c, mode) && !invalid.contains(&c) {
            invalid.push(c);
        }
    }
    if !invalid.is_empty() {
        return Err(FolderNameError::InvalidCharacters(invalid));
    }

    if mode == FilesystemMode::Windows {
        if name.ends_with(' ') || name.ends_with('.') {
            return Err(FolderNameError::TrailingDotOrSpace);
        }
        if let Some(base) = reserved_base(name) {
            return Err(FolderNameError::ReservedName(base));
        }
    }

    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(FolderNameError::TooLong);
    }

    Ok(())
}

/// Rewrite `name` so that it passes [`validate_folder_name`].
///
/// Names that are already valid come back untouched. On Windows a colon becomes
/// `" -"` so "Title: Subtitle" reads as "Title - Subtitle"; every other
/// offending character becomes `_`.
pub fn sanitize_folder_name(name: &str, mode: FilesystemMode) -> Sanitized {
    if validate_folder_name(name, mode).is_ok() {
        return Sanitized {
            name: name.to_string(),
            changed: false,
        };
    }

    let mut out = String::with_capacity(name.len());
    let mut replaced = false;

    for c in name.chars() {
        if !is_invalid_char(c, mode) {
            out.push(c);
            continue;
        }
        replaced = true;
        if mode == FilesystemMode::Windows && c == ':' {
            out.push_str(" -");
        } else {
            out.push(REPLACEMENT);
        }
    }

    if replaced {
        out = collapse_spaces(&out).trim_start().to_string();
    }

    if mode == FilesystemMode::Windows {
        out = trim_trailing_dots_and_spaces(&out);
    }

    if out.chars().count() > MAX_NAME_LENGTH {
        out = out.chars().take(MAX_NAME_LENGTH).collect();
        if mode == FilesystemMode::Windows {
            out = trim_trailing_dots_and_spaces(&out);
        }
    }

    if mode == FilesystemMode::Windows && reserved_base(&out).is_some() {
        out.insert(0, REPLACEMENT);
        if out.chars().count() > MAX_NAME_LENGTH {
            out = out.chars().take(MAX_NAME_LENGTH).collect();
            out = trim_trailing_dots_and_spaces(&out);
        }
    }

    if out.is_empty() || out == "." || out == ".." {
        out = REPLACEMENT.to_string();
    }

    Sanitized {
        changed: out != name,
        name: out,
    }
}

fn collapse_spaces(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_space = false;
    for c in s.chars() {
        if c == ' ' {
            if prev_space {
                continue;
            }
            prev_space = true;
        } else {
            prev_space = false;
        }
        out.push(c);
    }
    out
}

fn trim_trailing_dots_and_spaces(s: &str) -> String {
    s.trim_end_matches(|c| c == ' ' || c == '.').to_string()
}
