use crate::pathgen::FilesystemMode;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const MAX_TIMEOUT_SECS: u64 = 300;

macro_rules! config_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }, default = $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
        #[serde(rename_all = "lowercase")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown value '{}' (expected one of: {})",
                        other,
                        [$($text),+].join(", ")
                    )),
                }
            }
        }
    };
}

config_enum!(
    /// WebUI URL scheme
    Protocol { Http => "http", Https => "https" },
    default = Http
);

config_enum!(
    /// Which WebUI backend to use for session handling
    Strategy { Auto => "auto", Session => "session", Raw => "raw" },
    default = Auto
);

config_enum!(
    /// Offline mode never talks to qBittorrent; rules can only be exported
    ConnectionMode { Online => "online", Offline => "offline" },
    default = Online
);

config_enum!(
    Theme { System => "system", Light => "light", Dark => "dark" },
    default = System
);

/// `[connection]` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionSettings {
    pub protocol: Protocol,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub verify_ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    pub timeout_secs: u64,
    pub strategy: Strategy,
    pub mode: ConnectionMode,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            protocol: Protocol::Http,
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            username: "admin".to_string(),
            password: String::new(),
            verify_ssl: true,
            ca_cert: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            strategy: Strategy::Auto,
            mode: ConnectionMode::Online,
        }
    }
}

impl ConnectionSettings {
    /// WebUI root, e.g. `http://localhost:8080`
    pub fn base_url(&self) -> String {
        let host = self.host.trim();
        let host = host
            .strip_prefix("http://")
            .or_else(|| host.strip_prefix("https://"))
            .unwrap_or(host)
            .trim_end_matches('/');
        if host.contains(':') && !host.starts_with('[') {
            // Bare IPv6 literal
            format!("{}://[{}]:{}", self.protocol, host, self.port)
        } else {
            format!("{}://{}:{}", self.protocol, host, self.port)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn is_configured(&self) -> bool {
        !self.host.trim().is_empty() && self.port != 0
    }
}

/// `[rules]` section: defaults applied to every generated rule
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleDefaults {
    pub save_path: String,
    pub category: String,
    pub feeds: Vec<String>,
    /// `None` leaves the decision to the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_paused: Option<bool>,
    pub must_not_contain: String,
    pub use_regex: bool,
    pub flexible_whitespace: bool,
    pub flexible_punctuation: bool,
    /// Prefix rule names with "<Season> <Year> - "
    pub prefix_season: bool,
}

impl Default for RuleDefaults {
    fn default() -> Self {
        Self {
            save_path: String::new(),
            category: String::new(),
            feeds: Vec::new(),
            add_paused: None,
            must_not_contain: String::new(),
            use_regex: false,
            flexible_whitespace: true,
            flexible_punctuation: true,
            prefix_season: false,
        }
    }
}

/// `[ui]` section
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiPrefs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<String>,
    pub theme: Theme,
    pub filesystem_mode: FilesystemMode,
    pub auto_sanitize: bool,
    pub time_24h: bool,
}

impl Default for UiPrefs {
    fn default() -> Self {
        Self {
            geometry: None,
            theme: Theme::System,
            filesystem_mode: FilesystemMode::default(),
            auto_sanitize: true,
            time_24h: true,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppConfig {
    pub connection: ConnectionSettings,
    pub rules: RuleDefaults,
    pub ui: UiPrefs,
}

/// Value shape expected for a config key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Str,
    OptStr,
    Bool,
    OptBool,
    Int,
    List,
}

/// Every recognised `section.key`
pub const CONFIG_KEYS: &[(&str, KeyKind)] = &[
    ("connection.protocol", KeyKind::Str),
    ("connection.host", KeyKind::Str),
    ("connection.port", KeyKind::Int),
    ("connection.username", KeyKind::Str),
    ("connection.password", KeyKind::Str),
    ("connection.verify_ssl", KeyKind::Bool),
    ("connection.ca_cert", KeyKind::OptStr),
    ("connection.timeout_secs", KeyKind::Int),
    ("connection.strategy", KeyKind::Str),
    ("connection.mode", KeyKind::Str),
    ("rules.save_path", KeyKind::Str),
    ("rules.category", KeyKind::Str),
    ("rules.feeds", KeyKind::List),
    ("rules.add_paused", KeyKind::OptBool),
    ("rules.must_not_contain", KeyKind::Str),
    ("rules.use_regex", KeyKind::Bool),
    ("rules.flexible_whitespace", KeyKind::Bool),
    ("rules.flexible_punctuation", KeyKind::Bool),
    ("rules.prefix_season", KeyKind::Bool),
    ("ui.geometry", KeyKind::OptStr),
    ("ui.theme", KeyKind::Str),
    ("ui.filesystem_mode", KeyKind::Str),
    ("ui.auto_sanitize", KeyKind::Bool),
    ("ui.time_24h", KeyKind::Bool),
];

pub fn key_kind(key: &str) -> Option<KeyKind> {
    CONFIG_KEYS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// Errors that can occur while reading or writing the config file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Unknown config key '{0}'")]
    UnknownKey(String),

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("No configuration directory available on this system")]
    NoConfigDir,

    #[error("Config file already exists: {0}")]
    AlreadyExists(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.connection.port, 8080);
        assert_eq!(config.connection.timeout_secs, 10);
        assert_eq!(config.connection.strategy, Strategy::Auto);
        assert!(config.connection.verify_ssl);
        assert!(config.rules.add_paused.is_none());
        assert!(config.ui.auto_sanitize);
    }

    #[test]
    fn test_base_url() {
        let mut conn = ConnectionSettings::default();
        assert_eq!(conn.base_url(), "http://localhost:8080");

        conn.protocol = Protocol::Https;
        conn.host = "qbt.example.org/".to_string();
        conn.port = 443;
        assert_eq!(conn.base_url(), "https://qbt.example.org:443");

        conn.host = "::1".to_string();
        assert_eq!(conn.base_url(), "https://[::1]:443");
    }

    #[test]
    fn test_enum_parse() {
        assert_eq!("HTTPS".parse::<Protocol>(), Ok(Protocol::Https));
        assert_eq!("raw".parse::<Strategy>(), Ok(Strategy::Raw));
        assert_eq!("offline".parse::<ConnectionMode>(), Ok(ConnectionMode::Offline));
        let err = "ftp".parse::<Protocol>().unwrap_err();
        assert!(err.contains("http, https"));
    }

    #[test]
    fn test_key_kind_lookup() {
        assert_eq!(key_kind("connection.port"), Some(KeyKind::Int));
        assert_eq!(key_kind("rules.feeds"), Some(KeyKind::List));
        assert_eq!(key_kind("ui.colour"), None);
    }
}
