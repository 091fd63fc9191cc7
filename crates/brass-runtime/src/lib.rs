//! Brass Runtime - configuration, logging and server bootstrap.
//!
//! This crate provides:
//! - Layered configuration loading and validation ([`config`])
//! - Logging setup on `tracing-subscriber` ([`logging`])
//! - [`Server`], which ties configuration, logging and an
//!   [`Application`](brass_framework::Application) together
//!
//! # Feature Flags
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log format
//! - `http-server`: [`Server::run`] over the axum transport
//!
//! ```ignore
//! use brass_runtime::Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = build_registry()?;
//!     Server::builder().registry(registry).build()?.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod server;

pub use config::{BrassConfig, ConfigError, ConfigLoader, ConfigResult, load_config};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::LoggingBuilder;
pub use server::{Server, ServerBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and the span level type.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
