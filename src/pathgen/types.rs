use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum length of a single folder name, in characters
pub const MAX_NAME_LENGTH: usize = 255;

/// Characters Windows refuses in file and directory names
pub const WINDOWS_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Device names Windows reserves regardless of extension
pub const WINDOWS_RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Naming rules of the filesystem the qBittorrent host saves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilesystemMode {
    Posix,
    Windows,
}

impl FilesystemMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilesystemMode::Posix => "posix",
            FilesystemMode::Windows => "windows",
        }
    }
}

impl Default for FilesystemMode {
    fn default() -> Self {
        if cfg!(windows) {
            FilesystemMode::Windows
        } else {
            FilesystemMode::Posix
        }
    }
}

impl fmt::Display for FilesystemMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilesystemMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "posix" | "linux" | "unix" | "macos" => Ok(FilesystemMode::Posix),
            "windows" | "win" | "ntfs" => Ok(FilesystemMode::Windows),
            other => Err(format!(
                "unknown filesystem mode '{}' (expected posix or windows)",
                other
            )),
        }
    }
}

/// Why a folder name or save path was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FolderNameError {
    #[error("Folder name cannot be empty")]
    Empty,

    #[error("'.' and '..' are not valid folder names")]
    DotName,

    #[error("Contains invalid characters: {}", format_chars(.0))]
    InvalidCharacters(Vec<char>),

    #[error("Cannot end with space or period")]
    TrailingDotOrSpace,

    #[error("'{0}' is a reserved Windows name")]
    ReservedName(String),

    #[error("Exceeds maximum length ({MAX_NAME_LENGTH} characters)")]
    TooLong,

    #[error("Path traversal ('..') is not allowed in save paths")]
    PathTraversal,

    #[error("Invalid path segment '{segment}': {reason}")]
    InvalidSegment {
        segment: String,
        reason: Box<FolderNameError>,
    },
}

fn format_chars(chars: &[char]) -> String {
    chars
        .iter()
        .map(|c| {
            if c.is_control() {
                format!("U+{:04X}", *c as u32)
            } else {
                c.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Output of sanitization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub name: String,
    /// True when the input had to be altered
    pub changed: bool,
}

/// A title turned into a folder name, with its validation verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedTitle {
    pub folder_name: String,
    pub is_valid: bool,
    pub error: Option<String>,
    /// Auto-sanitization altered the title; callers should warn
    pub changed: bool,
}
