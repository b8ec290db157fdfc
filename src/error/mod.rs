mod codes;

pub use codes::ExitCode;

use crate::cache::CacheError;
use crate::config::ConfigError;
use crate::feedcheck::FeedError;
use crate::pathgen::FolderNameError;
use crate::qbt::QbtError;
use crate::rules::io::ImportError;
use crate::seasonal::SeasonalError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Connection failed: {0}")]
    Connection(QbtError),

    #[error("Authentication failed: {0}")]
    Authentication(QbtError),

    #[error("Validation failed: {context}")]
    Validation { context: String, issues: Vec<String> },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Seasonal data error: {0}")]
    Seasonal(#[from] SeasonalError),

    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),

    #[error("Cannot read {path}: {source}")]
    Import {
        path: PathBuf,
        #[source]
        source: ImportError,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Clipboard error: {0}")]
    Clipboard(String),

    #[error("No titles to process")]
    NoTitles,

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("{failed} of {total} rules failed to upload")]
    PartialFailure { failed: usize, total: usize },

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            AppError::Connection(_) => ExitCode::ConnectionError,
            AppError::Authentication(_) => ExitCode::AuthenticationError,
            AppError::Validation { .. } => ExitCode::ValidationError,
            AppError::Config(_) => ExitCode::ConfigError,
            AppError::Cache(_) => ExitCode::CacheError,
            AppError::Seasonal(_) => ExitCode::SeasonalError,
            AppError::Feed(_) => ExitCode::ConnectionError,
            AppError::Import { .. } => ExitCode::ValidationError,
            AppError::Io { .. } => ExitCode::IoError,
            AppError::Clipboard(_) => ExitCode::ClipboardError,
            AppError::NoTitles => ExitCode::NoTitles,
            AppError::InvalidArguments(_) => ExitCode::InvalidArguments,
            AppError::PartialFailure { .. } => ExitCode::PartialFailure,
            AppError::Other(_) => ExitCode::GeneralError,
        }
    }

    pub fn detailed_message(&self) -> String {
        match self {
            AppError::Connection(err) => {
                let hint = match err {
                    QbtError::NotConfigured => {
                        "Set a host and port with `titles2qbt config set connection.host <HOST>`\n\
                         or the QBT_HOST / QBT_PORT environment variables."
                    }
                    QbtError::Timeout | QbtError::Refused(_) | QbtError::HostNotFound(_) => {
                        "Check that:\n\
                         - qBittorrent is running\n\
                         - Web UI is enabled (Tools > Options > Web UI)\n\
                         - host, port and protocol match the Web UI settings"
                    }
                    QbtError::Tls(_) => {
                        "For a self-signed certificate set connection.ca_cert to its PEM file,\n\
                         or disable verification with connection.verify_ssl = false."
                    }
                    QbtError::Forbidden => "Log in again; the session is no longer valid.",
                    _ => "Run with -vv for request details.",
                };
                format!("Could not talk to qBittorrent:\n  {}\n\n{}", err, hint)
            }

            AppError::Authentication(err) => {
                let hint = if matches!(err, QbtError::Banned) {
                    "qBittorrent temporarily bans an IP after repeated failures.\n\
                     Wait for the ban to expire or restart qBittorrent."
                } else {
                    "Check connection.username and connection.password\n\
                     (or QBT_USERNAME / QBT_PASSWORD)."
                };
                format!("Login to qBittorrent failed:\n  {}\n\n{}", err, hint)
            }

            AppError::Validation { context, issues } => {
                let mut msg = format!("{}:\n", context);
                for issue in issues.iter().take(20) {
                    msg.push_str(&format!("  - {}\n", issue));
                }
                if issues.len() > 20 {
                    msg.push_str(&format!("  ... and {} more\n", issues.len() - 20));
                }
                msg
            }

            AppError::Config(err) => {
                format!(
                    "Configuration error:\n  {}\n\n\
                     Run `titles2qbt config show` to see the active settings.",
                    err
                )
            }

            AppError::Cache(err) => {
                format!(
                    "Cache error: {}\n\n\
                     The cache file may be corrupted. \
                     Delete the cache file to rebuild it.",
                    err
                )
            }

            AppError::Seasonal(err) => {
                format!(
                    "Could not load seasonal titles:\n  {}\n\n\
                     Enter titles manually or import them from a file instead.",
                    err
                )
            }

            AppError::Feed(err) => format!("Could not read the RSS feed:\n  {}", err),

            AppError::Import { path, source } => {
                format!(
                    "Failed to import {}:\n  {}\n\n\
                     Expected a rule export (JSON object or array of rules),\n\
                     a JSON list of titles, or one title per line.",
                    path.display(),
                    source
                )
            }

            AppError::Io { path, source } => {
                format!(
                    "File error:\n  {}\n  {}\n\n\
                     Check the path and file permissions.",
                    path.display(),
                    source
                )
            }

            AppError::Clipboard(message) => {
                format!(
                    "Could not read the clipboard: {}\n\n\
                     Save the titles to a file and use --file instead.",
                    message
                )
            }

            AppError::NoTitles => "No titles were given.\n\n\
                 Pass titles as arguments, or use --file, --clipboard or --seasonal."
                .to_string(),

            AppError::InvalidArguments(message) => message.clone(),

            AppError::PartialFailure { failed, total } => {
                format!(
                    "{} of {} rules could not be uploaded; see the messages above.",
                    failed, total
                )
            }

            AppError::Other(message) => message.clone(),
        }
    }
}

impl From<QbtError> for AppError {
    fn from(err: QbtError) -> Self {
        if err.is_auth() {
            AppError::Authentication(err)
        } else {
            AppError::Connection(err)
        }
    }
}

impl From<FolderNameError> for AppError {
    fn from(err: FolderNameError) -> Self {
        AppError::Validation {
            context: "Invalid path".to_string(),
            issues: vec![err.to_string()],
        }
    }
}

impl AppError {
    /// Attach the file path to an import failure
    pub fn import(path: impl Into<PathBuf>, source: ImportError) -> Self {
        AppError::Import {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(
            AppError::from(QbtError::Timeout).exit_code(),
            ExitCode::ConnectionError
        );
        assert_eq!(
            AppError::from(QbtError::BadCredentials).exit_code(),
            ExitCode::AuthenticationError
        );
        assert_eq!(AppError::NoTitles.exit_code(), ExitCode::NoTitles);
        assert_eq!(
            AppError::PartialFailure {
                failed: 1,
                total: 3
            }
            .exit_code(),
            ExitCode::PartialFailure
        );
    }

    #[test]
    fn test_detailed_message_includes_context() {
        let err = AppError::Validation {
            context: "2 rules are invalid".to_string(),
            issues: vec!["rule1: empty pattern".to_string(), "rule2: bad path".to_string()],
        };

        let msg = err.detailed_message();
        assert!(msg.contains("rule1"));
        assert!(msg.contains("rule2"));
    }

    #[test]
    fn test_connection_messages_give_hints() {
        let msg = AppError::from(QbtError::Refused("localhost:8080".into())).detailed_message();
        assert!(msg.contains("refused"));
        assert!(msg.contains("Web UI"));

        let msg = AppError::from(QbtError::Banned).detailed_message();
        assert!(msg.contains("ban"));
    }

    #[test]
    fn test_folder_name_error_conversion() {
        let app_err: AppError = FolderNameError::PathTraversal.into();
        assert_eq!(app_err.exit_code(), ExitCode::ValidationError);
    }
}
