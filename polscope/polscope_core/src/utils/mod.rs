//! Utility functions and types.
//!
//! This module provides the logging and configuration helpers shared by
//! the library crates and the command-line front end.

pub mod config;
pub mod logging;

pub use config::{Config, ConfigValue, FromConfigValue};
pub use logging::{init_logging, LogLevel};
