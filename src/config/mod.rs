//! TOML configuration: connection settings, rule defaults and UI preferences

mod types;

pub use types::{
    key_kind, AppConfig, ConfigError, ConnectionMode, ConnectionSettings, KeyKind, Protocol,
    RuleDefaults, Strategy, Theme, UiPrefs, CONFIG_KEYS, DEFAULT_PORT, DEFAULT_TIMEOUT_SECS,
    MAX_TIMEOUT_SECS,
};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use toml::Value;
use tracing::{debug, info, warn};

pub const ENV_QBT_HOST: &str = "QBT_HOST";
pub const ENV_QBT_PORT: &str = "QBT_PORT";
pub const ENV_QBT_USERNAME: &str = "QBT_USERNAME";
pub const ENV_QBT_PASSWORD: &str = "QBT_PASSWORD";
pub const ENV_QBT_PROTOCOL: &str = "QBT_PROTOCOL";

/// `<config dir>/titles2qbt/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("titles2qbt").join("config.toml"))
}

impl AppConfig {
    /// Load the config file, falling back to defaults for anything missing or invalid.
    ///
    /// Never fails: problems are logged and the affected keys keep their defaults.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => {
                debug!(path = %path.display(), "Loading config");
                Self::from_toml_str(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No config file found, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!("Failed to read config {:?}: {}, using defaults", path, e);
                Self::default()
            }
        }
    }

    /// Parse TOML leniently: each bad key is warned about and skipped
    pub fn from_toml_str(content: &str) -> Self {
        let mut config = Self::default();

        let table: toml::Table = match content.parse() {
            Ok(table) => table,
            Err(e) => {
                warn!("Config file is not valid TOML ({}), using defaults", e);
                return config;
            }
        };

        for (section, value) in &table {
            let Some(entries) = value.as_table() else {
                warn!("Config section '{}' is not a table, ignoring", section);
                continue;
            };
            for (name, value) in entries {
                let key = format!("{}.{}", section, name);
                if let Err(e) = config.apply(&key, value) {
                    warn!("{}; using default", e);
                }
            }
        }

        config
    }

    /// Apply environment overrides (`QBT_HOST`, `QBT_PORT`, ...)
    pub fn apply_env(&mut self) {
        let overrides = [
            (ENV_QBT_HOST, "connection.host"),
            (ENV_QBT_PORT, "connection.port"),
            (ENV_QBT_USERNAME, "connection.username"),
            (ENV_QBT_PASSWORD, "connection.password"),
            (ENV_QBT_PROTOCOL, "connection.protocol"),
        ];

        for (var, key) in overrides {
            let Ok(raw) = env::var(var) else {
                continue;
            };
            match self.set_value(key, &raw) {
                Ok(()) => debug!(var = %var, "Applied environment override"),
                Err(e) => warn!("Ignoring {}: {}", var, e),
            }
        }
    }

    /// Set `section.key` from its textual form, as typed on the command line
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let kind = key_kind(key).ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        // Passwords may legitimately start or end with spaces
        let raw = if key == "connection.password" { raw } else { raw.trim() };

        let value = match kind {
            KeyKind::Str | KeyKind::OptStr => Value::String(raw.to_string()),
            KeyKind::Bool => Value::Boolean(parse_bool(key, raw)?),
            KeyKind::OptBool => match raw.to_lowercase().as_str() {
                "" | "default" | "none" => Value::String("default".to_string()),
                _ => Value::Boolean(parse_bool(key, raw)?),
            },
            KeyKind::Int => Value::Integer(raw.parse::<i64>().map_err(|_| {
                invalid(key, format!("'{}' is not a whole number", raw))
            })?),
            KeyKind::List => Value::Array(
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| Value::String(s.to_string()))
                    .collect(),
            ),
        };

        self.apply(key, &value)
    }

    /// Apply a single TOML value to `section.key`
    pub fn apply(&mut self, key: &str, value: &Value) -> Result<(), ConfigError> {
        match key {
            "connection.protocol" => self.connection.protocol = parse_enum(key, value)?,
            "connection.host" => self.connection.host = expect_str(key, value)?.trim().to_string(),
            "connection.port" => {
                let port = expect_int(key, value)?;
                if !(1..=65535).contains(&port) {
                    return Err(invalid(key, format!("port {} outside 1-65535", port)));
                }
                self.connection.port = port as u16;
            }
            "connection.username" => self.connection.username = expect_str(key, value)?.to_string(),
            "connection.password" => self.connection.password = expect_str(key, value)?.to_string(),
            "connection.verify_ssl" => self.connection.verify_ssl = expect_bool(key, value)?,
            "connection.ca_cert" => {
                self.connection.ca_cert = optional_str(key, value)?.map(PathBuf::from)
            }
            "connection.timeout_secs" => {
                let secs = expect_int(key, value)?;
                if secs < 1 || secs as u64 > MAX_TIMEOUT_SECS {
                    return Err(invalid(
                        key,
                        format!("timeout {} outside 1-{} seconds", secs, MAX_TIMEOUT_SECS),
                    ));
                }
                self.connection.timeout_secs = secs as u64;
            }
            "connection.strategy" => self.connection.strategy = parse_enum(key, value)?,
            "connection.mode" => self.connection.mode = parse_enum(key, value)?,

            "rules.save_path" => self.rules.save_path = expect_str(key, value)?.trim().to_string(),
            "rules.category" => self.rules.category = expect_str(key, value)?.trim().to_string(),
            "rules.feeds" => self.rules.feeds = expect_list(key, value)?,
            "rules.add_paused" => {
                self.rules.add_paused = match value {
                    Value::Boolean(b) => Some(*b),
                    Value::String(s) if s.eq_ignore_ascii_case("default") => None,
                    other => return Err(wrong_type(key, "boolean or \"default\"", other)),
                }
            }
            "rules.must_not_contain" => {
                self.rules.must_not_contain = expect_str(key, value)?.to_string()
            }
            "rules.use_regex" => self.rules.use_regex = expect_bool(key, value)?,
            "rules.flexible_whitespace" => {
                self.rules.flexible_whitespace = expect_bool(key, value)?
            }
            "rules.flexible_punctuation" => {
                self.rules.flexible_punctuation = expect_bool(key, value)?
            }
            "rules.prefix_season" => self.rules.prefix_season = expect_bool(key, value)?,

            "ui.geometry" => self.ui.geometry = optional_str(key, value)?.map(str::to_string),
            "ui.theme" => self.ui.theme = parse_enum(key, value)?,
            "ui.filesystem_mode" => self.ui.filesystem_mode = parse_enum(key, value)?,
            "ui.auto_sanitize" => self.ui.auto_sanitize = expect_bool(key, value)?,
            "ui.time_24h" => self.ui.time_24h = expect_bool(key, value)?,

            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Copy with the password masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.connection.password.is_empty() {
            copy.connection.password = "********".to_string();
        }
        copy
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config atomically, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml_string()?;
        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        info!("Saved config to {:?}", path);
        Ok(())
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn wrong_type(key: &str, expected: &str, value: &Value) -> ConfigError {
    invalid(
        key,
        format!("expected {}, found {}", expected, value.type_str()),
    )
}

fn expect_str<'a>(key: &str, value: &'a Value) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| wrong_type(key, "string", value))
}

fn optional_str<'a>(key: &str, value: &'a Value) -> Result<Option<&'a str>, ConfigError> {
    let s = expect_str(key, value)?.trim();
    Ok(if s.is_empty() { None } else { Some(s) })
}

fn expect_bool(key: &str, value: &Value) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| wrong_type(key, "boolean", value))
}

fn expect_int(key: &str, value: &Value) -> Result<i64, ConfigError> {
    value.as_integer().ok_or_else(|| wrong_type(key, "integer", value))
}

fn expect_list(key: &str, value: &Value) -> Result<Vec<String>, ConfigError> {
    let items = value
        .as_array()
        .ok_or_else(|| wrong_type(key, "array of strings", value))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.trim().to_string())
                .ok_or_else(|| wrong_type(key, "array of strings", value))
        })
        .filter(|item| !matches!(item, Ok(s) if s.is_empty()))
        .collect()
}

fn parse_enum<T: FromStr<Err = String>>(key: &str, value: &Value) -> Result<T, ConfigError> {
    expect_str(key, value)?
        .parse()
        .map_err(|reason: String| invalid(key, reason))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(invalid(key, format!("'{}' is not a boolean", raw))),
    }
}
