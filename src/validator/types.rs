use std::fmt;
use thiserror::Error;

/// Why a single import entry was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("entry is not a JSON object")]
    NotAnObject,

    #[error("rule name is empty")]
    EmptyName,

    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("field '{field}' must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("save path '{0}' contains '..'")]
    PathTraversal(String),

    #[error("no usable title")]
    MissingTitle,
}

/// A rejected entry, with enough context to point the user at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportWarning {
    /// Zero-based position in the source (line number for plain text)
    pub index: usize,
    pub name: Option<String>,
    pub error: EntryError,
}

impl fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "entry {} ('{}'): {}", self.index + 1, name, self.error),
            None => write!(f, "entry {}: {}", self.index + 1, self.error),
        }
    }
}
