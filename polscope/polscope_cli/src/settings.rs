//! Effective settings for the command-line front end.
//!
//! Settings come from an optional TOML configuration file. Command-line
//! flags override them afterwards, in the command handlers.

use clap::ValueEnum;
use polscope_core::{Config, LogLevel};
use polscope_policy::MatchMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while reading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A key holds a value of the wrong type
    #[error("Setting {key} must be a {expected}")]
    WrongType { key: &'static str, expected: &'static str },

    /// A key holds a value outside its allowed set
    #[error("Invalid value {value:?} for setting {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// How search results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// One line per result with indented proofs.
    #[default]
    Text,
    /// A JSON report.
    Json,
}

impl FromStr for OutputFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(()),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Logging section of the effective settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSettings {
    /// Default log level; `RUST_LOG` still wins.
    pub level: LogLevel,
}

/// Search section of the effective settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySettings {
    /// How tests combine when `--mode` is not given.
    pub match_mode: MatchMode,

    /// Whether regex parameters ignore case by default.
    pub ignore_case: bool,

    /// Whether alias entries are kept as top-level candidates.
    pub include_aliases: bool,
}

/// Output section of the effective settings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputSettings {
    /// Result format when `--format` is not given.
    pub format: OutputFormat,
}

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSettings {
    pub log: LogSettings,
    pub search: QuerySettings,
    pub output: OutputSettings,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            log: LogSettings {
                level: LogLevel::Info,
            },
            search: QuerySettings {
                match_mode: MatchMode::All,
                ignore_case: false,
                include_aliases: false,
            },
            output: OutputSettings {
                format: OutputFormat::Text,
            },
        }
    }
}

impl SearchSettings {
    /// Read settings from a configuration, applying defaults for missing keys.
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration. Unknown keys are ignored.
    ///
    /// # Returns
    ///
    /// * `Ok(SearchSettings)` - The effective settings.
    /// * `Err(SettingsError)` - If a recognised key holds a bad value.
    pub fn from_config(config: &Config) -> Result<Self, SettingsError> {
        let mut settings = Self::default();

        if let Some(level) = string_setting(config, "log.level")? {
            settings.log.level = level.parse().map_err(|_| SettingsError::InvalidValue {
                key: "log.level",
                value: level,
            })?;
        }
        if let Some(mode) = string_setting(config, "search.match_mode")? {
            settings.search.match_mode =
                MatchMode::from_str(&mode).map_err(|_| SettingsError::InvalidValue {
                    key: "search.match_mode",
                    value: mode,
                })?;
        }
        if let Some(ignore_case) = bool_setting(config, "search.ignore_case")? {
            settings.search.ignore_case = ignore_case;
        }
        if let Some(include_aliases) = bool_setting(config, "search.include_aliases")? {
            settings.search.include_aliases = include_aliases;
        }
        if let Some(format) = string_setting(config, "output.format")? {
            settings.output.format = format.parse().map_err(|_| SettingsError::InvalidValue {
                key: "output.format",
                value: format,
            })?;
        }

        Ok(settings)
    }
}

fn string_setting(config: &Config, key: &'static str) -> Result<Option<String>, SettingsError> {
    if !config.contains(key) {
        return Ok(None);
    }
    config
        .get_as::<String>(key)
        .map(Some)
        .ok_or(SettingsError::WrongType {
            key,
            expected: "string",
        })
}

fn bool_setting(config: &Config, key: &'static str) -> Result<Option<bool>, SettingsError> {
    if !config.contains(key) {
        return Ok(None);
    }
    config
        .get_as::<bool>(key)
        .map(Some)
        .ok_or(SettingsError::WrongType {
            key,
            expected: "boolean",
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_for_empty_config() {
        let settings = SearchSettings::from_config(&Config::new()).unwrap();
        assert_eq!(settings, SearchSettings::default());
        assert_eq!(settings.log.level, LogLevel::Info);
        assert_eq!(settings.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_recognised_keys() {
        let config = Config::from_toml_str(
            r#"
            [log]
            level = "debug"

            [search]
            match_mode = "any"
            ignore_case = true
            include_aliases = true

            [output]
            format = "json"
            "#,
        )
        .unwrap();

        let settings = SearchSettings::from_config(&config).unwrap();
        assert_eq!(settings.log.level, LogLevel::Debug);
        assert_eq!(settings.search.match_mode, MatchMode::Any);
        assert!(settings.search.ignore_case);
        assert!(settings.search.include_aliases);
        assert_eq!(settings.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_bad_values() {
        let config = Config::from_toml_str("[search]\nmatch_mode = \"some\"").unwrap();
        assert!(matches!(
            SearchSettings::from_config(&config),
            Err(SettingsError::InvalidValue { key: "search.match_mode", .. })
        ));

        let config = Config::from_toml_str("[search]\nignore_case = \"yes\"").unwrap();
        assert!(matches!(
            SearchSettings::from_config(&config),
            Err(SettingsError::WrongType { key: "search.ignore_case", .. })
        ));
    }

    #[test]
    fn test_settings_render_as_toml() {
        let text = toml::to_string(&SearchSettings::default()).unwrap();
        assert!(text.contains("[search]"));
        assert!(text.contains("match_mode = \"all\""));
        assert!(text.contains("format = \"text\""));
    }
}
