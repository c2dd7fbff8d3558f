//! Key/value configuration with typed defaults
//!
//! Every lookup takes a default and never fails: a missing key or a value that
//! does not parse yields the default.

use super::error::{LoggerError, Result};
use std::collections::HashMap;

/// Recognized configuration keys
pub mod keys {
    pub const SINKS_LIST: &str = "sinks.list";
    pub const DEFAULT_LEVEL: &str = "default.level";
    pub const CONSOLE_PREFIX: &str = "console.prefix";
    pub const CONSOLE_COLORS: &str = "console.colors";
    pub const LOGFILE_PREFIX: &str = "logfile.prefix";
    pub const LOGFILE_NAME: &str = "logfile.name";
    pub const LOGFILE_KMAXSIZE: &str = "logfile.kmaxsize";
    pub const LOGFILE_BACKUPS: &str = "logfile.backups";
    pub const ERROR_MODE: &str = "error.mode";
    pub const ERRORS_ROLLUP: &str = "errors.rollup";
    pub const DUMP_DEPTH: &str = "dump.depth";
    pub const DUMP_WIDTH: &str = "dump.width";
}

pub trait Configuration: Send + Sync {
    /// Raw lookup
    fn get(&self, key: &str) -> Option<String>;

    fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn get_integer(&self, key: &str, default: i32) -> i32 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_long(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key).map(|v| v.trim().to_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "yes" | "on" | "1") => true,
            Some(v) if matches!(v.as_str(), "false" | "no" | "off" | "0") => false,
            _ => default,
        }
    }
}

/// In-memory configuration
///
/// # Example
///
/// ```
/// use quill_logger::core::config::{keys, Configuration, MapConfig};
///
/// let config = MapConfig::new()
///     .set(keys::DEFAULT_LEVEL, "Info")
///     .set(keys::LOGFILE_BACKUPS, "4");
///
/// assert_eq!(config.get_string(keys::DEFAULT_LEVEL, "Warn"), "Info");
/// assert_eq!(config.get_long(keys::LOGFILE_BACKUPS, 10), 4);
/// assert_eq!(config.get_long(keys::LOGFILE_KMAXSIZE, 100), 100);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapConfig {
    values: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Load a flat JSON object; strings, numbers and booleans become values
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not JSON or not an object, or if a value
    /// is an array, object or null.
    pub fn from_json(text: &str) -> Result<Self> {
        let parsed: serde_json::Map<String, serde_json::Value> = serde_json::from_str(text)?;
        let mut config = Self::new();
        for (key, value) in parsed {
            let value = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::Bool(b) => b.to_string(),
                other => {
                    return Err(LoggerError::config(
                        "MapConfig",
                        format!("value for '{}' must be a scalar, got {}", key, other),
                    ))
                }
            };
            config.values.insert(key, value);
        }
        Ok(config)
    }
}

impl Configuration for MapConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Configuration backed by environment variables.
///
/// Key `logfile.name` is looked up as `QUILL_LOGFILE_NAME`.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    pub const DEFAULT_PREFIX: &'static str = "QUILL_";

    pub fn new() -> Self {
        Self::with_prefix(Self::DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Environment variable name for a key
    pub fn variable_name(&self, key: &str) -> String {
        let mapped: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect();
        format!("{}{}", self.prefix, mapped)
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Configuration for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(self.variable_name(key)).ok()
    }
}
