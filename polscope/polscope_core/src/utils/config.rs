//! Configuration utilities.
//!
//! Settings are read from TOML files into a loosely typed tree of
//! `ConfigValue`s and accessed by dotted path (`search.match_mode`).
//! Layers are combined with `Config::merge`, later layers winning, so a
//! command line can override a file which overrides built-in defaults.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::{Error, Result};

/// A configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Null value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Integer value.
    Integer(i64),

    /// Floating-point value.
    Float(f64),

    /// String value.
    String(String),

    /// Array of values.
    Array(Vec<ConfigValue>),

    /// Map of values.
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Get this value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get this value as an integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as a map.
    pub fn as_map(&self) -> Option<&BTreeMap<String, ConfigValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get a value from a map by key.
    ///
    /// # Returns
    ///
    /// The value with the given key, or `None` if this value is not a map
    /// or the key does not exist.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|m| m.get(key))
    }

    /// Merge another value into this one.
    ///
    /// Maps are merged key by key, recursively. Any other combination
    /// replaces this value with `other`.
    ///
    /// # Arguments
    ///
    /// * `other` - The value to merge with.
    pub fn merge(&mut self, other: ConfigValue) {
        match (self, other) {
            (Self::Map(a), Self::Map(b)) => {
                for (key, value) in b {
                    match a.get_mut(&key) {
                        Some(existing) => existing.merge(value),
                        None => {
                            a.insert(key, value);
                        }
                    }
                }
            }
            (a, b) => *a = b,
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<toml::Value> for ConfigValue {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::Boolean(b) => Self::Bool(b),
            toml::Value::Integer(i) => Self::Integer(i),
            toml::Value::Float(f) => Self::Float(f),
            toml::Value::String(s) => Self::String(s),
            toml::Value::Datetime(d) => Self::String(d.to_string()),
            toml::Value::Array(a) => Self::Array(a.into_iter().map(Self::from).collect()),
            toml::Value::Table(t) => {
                Self::Map(t.into_iter().map(|(k, v)| (k, Self::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::String(s) => write!(f, "\"{}\"", s),
            Self::Array(a) => {
                let items: Vec<String> = a.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", items.join(", "))
            }
            Self::Map(m) => {
                let items: Vec<String> = m.iter().map(|(k, v)| format!("{} = {}", k, v)).collect();
                write!(f, "{{{}}}", items.join(", "))
            }
        }
    }
}

/// A configuration tree addressed by dotted paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// The root value, always a map.
    pub root: ConfigValue,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self {
            root: ConfigValue::Map(BTreeMap::new()),
        }
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Arguments
    ///
    /// * `text` - The TOML document.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - The parsed configuration.
    /// * `Err` - If the text is not valid TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = text
            .parse()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
        Ok(Self {
            root: ConfigValue::from(toml::Value::Table(table)),
        })
    }

    /// Load a configuration from a TOML file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path of the file.
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - The parsed configuration.
    /// * `Err` - If the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Get a value by dotted path.
    ///
    /// # Returns
    ///
    /// The value at the given path, or `None` if the path does not exist.
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        path.split('.')
            .filter(|part| !part.is_empty())
            .try_fold(&self.root, |current, key| current.get(key))
    }

    /// Get a value by path as a specific type.
    ///
    /// # Returns
    ///
    /// The converted value, or `None` if the path does not exist or holds a
    /// value of another type.
    pub fn get_as<T: FromConfigValue>(&self, path: &str) -> Option<T> {
        self.get(path).and_then(T::from_config_value)
    }

    /// Set a value by dotted path, creating intermediate maps.
    ///
    /// Setting a map value merges it into any map already at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the value.
    /// * `value` - The value to set.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - If the value was set.
    /// * `Err` - If the path is empty.
    pub fn set(&mut self, path: &str, value: impl Into<ConfigValue>) -> Result<()> {
        let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Err(Error::Config("empty configuration path".to_string()));
        }

        let mut nested = value.into();
        for key in parts.iter().rev() {
            let mut map = BTreeMap::new();
            map.insert(key.to_string(), nested);
            nested = ConfigValue::Map(map);
        }
        self.root.merge(nested);
        Ok(())
    }

    /// Check if a path exists in the configuration.
    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Merge another configuration into this one; `other` wins on conflicts.
    pub fn merge(&mut self, other: Config) {
        self.root.merge(other.root);
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

/// Trait for converting a ConfigValue to a specific type.
pub trait FromConfigValue: Sized {
    /// Convert a ConfigValue to this type, or `None` if it has another type.
    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_bool()
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_integer()
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_str().map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml() {
        let config = Config::from_toml_str(
            r#"
            [log]
            level = "debug"

            [search]
            ignore_case = true
            match_mode = "any"
            "#,
        )
        .unwrap();

        assert_eq!(config.get_as::<String>("log.level").as_deref(), Some("debug"));
        assert_eq!(config.get_as::<bool>("search.ignore_case"), Some(true));
        assert_eq!(config.get_as::<bool>("search.match_mode"), None);
        assert!(!config.contains("output.format"));
    }

    #[test]
    fn test_config_invalid_toml() {
        let err = Config::from_toml_str("[log\nlevel = 1").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_config_set_creates_maps() {
        let mut config = Config::new();
        config.set("output.format", "json").unwrap();
        config.set("search.include_aliases", true).unwrap();
        assert_eq!(config.get_as::<String>("output.format").as_deref(), Some("json"));
        assert_eq!(config.get_as::<bool>("search.include_aliases"), Some(true));
        assert!(config.set("", 1i64).is_err());
    }

    #[test]
    fn test_config_merge_overrides() {
        let mut base = Config::new();
        base.set("log.level", "info").unwrap();
        base.set("search.match_mode", "all").unwrap();

        let mut overrides = Config::new();
        overrides.set("log.level", "trace").unwrap();

        base.merge(overrides);
        assert_eq!(base.get_as::<String>("log.level").as_deref(), Some("trace"));
        assert_eq!(base.get_as::<String>("search.match_mode").as_deref(), Some("all"));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polscope.toml");
        std::fs::write(&path, "[output]\nformat = \"json\"\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.get_as::<String>("output.format").as_deref(), Some("json"));
    }
}
