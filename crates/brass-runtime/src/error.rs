//! Runtime error types.

use brass_transport::TransportError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while bootstrapping or running a server.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Loading or validating the configuration failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The application could not be assembled from the registry.
    #[error("Failed to build application: {0}")]
    Declaration(#[from] brass_core::Error),

    /// The transport failed to bind or serve.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
