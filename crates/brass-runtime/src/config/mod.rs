//! Configuration module for the Brass runtime.
//!
//! This module provides layered configuration loading (defaults, files,
//! `BRASS_*` environment variables, programmatic overrides) and validation
//! for the application, server and logging settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AppConfig, BrassConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, ServerConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
