use serde::Deserialize;
use std::error::Error as StdError;
use thiserror::Error;

/// Session lifecycle of a [`QbtClient`](super::QbtClient)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Authenticating,
    Connected,
}

/// Errors that can occur when talking to the qBittorrent WebUI
#[derive(Error, Debug)]
pub enum QbtError {
    #[error("Host or port is empty")]
    NotConfigured,

    #[error("Connection timed out; check that the WebUI is running and reachable")]
    Timeout,

    #[error("Connection refused by {0}; is the WebUI enabled on that port?")]
    Refused(String),

    #[error("No connection: host {0} not found")]
    HostNotFound(String),

    #[error("TLS error: {0}; check verify_ssl and ca_cert settings")]
    Tls(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication failed: invalid username or password")]
    BadCredentials,

    #[error("Authentication refused: IP banned after too many failed login attempts")]
    Banned,

    #[error("Not connected; log in first")]
    NotConnected,

    #[error("Access forbidden; the session may have expired")]
    Forbidden,

    #[error("HTTP {status} from {endpoint}: {message}")]
    Http {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Unexpected response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },

    #[error("Rule '{name}' was not sent: {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("Failed to set up HTTP client: {0}")]
    Client(String),
}

impl QbtError {
    /// Failures of the login step itself
    pub fn is_auth(&self) -> bool {
        matches!(self, QbtError::BadCredentials | QbtError::Banned)
    }

    /// Map a transport-level reqwest error onto a user-facing category
    pub fn from_transport(err: reqwest::Error, target: &str) -> Self {
        if err.is_timeout() {
            return QbtError::Timeout;
        }

        let mut chain = String::new();
        let mut refused = false;
        let mut source: Option<&(dyn StdError + 'static)> = Some(&err);
        while let Some(e) = source {
            if let Some(io_err) = e.downcast_ref::<std::io::Error>() {
                match io_err.kind() {
                    std::io::ErrorKind::ConnectionRefused => refused = true,
                    std::io::ErrorKind::TimedOut => return QbtError::Timeout,
                    _ => {}
                }
            }
            chain.push_str(&e.to_string().to_lowercase());
            chain.push(' ');
            source = e.source();
        }

        if refused || chain.contains("connection refused") {
            QbtError::Refused(target.to_string())
        } else if chain.contains("dns")
            || chain.contains("failed to lookup")
            || chain.contains("name or service not known")
            || chain.contains("no such host")
        {
            QbtError::HostNotFound(target.to_string())
        } else if chain.contains("certificate")
            || chain.contains("tls")
            || chain.contains("ssl")
            || chain.contains("handshake")
        {
            QbtError::Tls(err.to_string())
        } else if chain.contains("timed out") {
            QbtError::Timeout
        } else {
            QbtError::Connection(err.to_string())
        }
    }
}

/// A download category as reported by `torrents/categories`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Category {
    pub name: String,
    #[serde(rename = "savePath", default)]
    pub save_path: String,
}

/// An RSS feed registered on the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedInfo {
    /// Backslash-separated RSS tree path, e.g. `Anime\SubsPlease`
    pub path: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_are_distinct() {
        let messages = [
            QbtError::Timeout.to_string(),
            QbtError::Refused("localhost:8080".into()).to_string(),
            QbtError::HostNotFound("nas".into()).to_string(),
            QbtError::Tls("bad cert".into()).to_string(),
            QbtError::Connection("reset".into()).to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in messages.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
        assert!(messages[0].contains("timed out"));
        assert!(messages[1].contains("refused"));
        // Tls (index 3) names the certificate problem instead
        for message in [&messages[0], &messages[1], &messages[2], &messages[4]] {
            let lower = message.to_lowercase();
            assert!(lower.contains("connection") || lower.contains("timed out"), "{}", message);
        }
    }

    #[test]
    fn test_is_auth() {
        assert!(QbtError::BadCredentials.is_auth());
        assert!(QbtError::Banned.is_auth());
        assert!(!QbtError::Timeout.is_auth());
    }

    #[test]
    fn test_category_deserialize() {
        let cat: Category =
            serde_json::from_str(r#"{"name": "Anime", "savePath": "/data/anime"}"#).unwrap();
        assert_eq!(cat.save_path, "/data/anime");

        let cat: Category = serde_json::from_str(r#"{"name": "Bare"}"#).unwrap();
        assert!(cat.save_path.is_empty());
    }
}
