//! Error types for the Brass framework.

use brass_core::BoxError;
use thiserror::Error;

/// Errors raised while reading a request or building a response.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The body could not be decoded from, or the value encoded to, JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The body is not valid UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// A header name or value was rejected.
    #[error("invalid header '{name}'")]
    InvalidHeader {
        /// Header name as given.
        name: String,
    },
}

/// Errors raised by parameter resolvers and typed parameter access.
#[derive(Debug, Clone, Error)]
pub enum ParamError {
    /// The route has no path parameter with this name.
    #[error("missing path parameter '{0}'")]
    MissingPathParam(String),

    /// The method asked for more parameters than were declared.
    #[error("parameter index {index} is out of range ({len} resolved)")]
    Index {
        /// Requested index.
        index: usize,
        /// Number of resolved parameters.
        len: usize,
    },

    /// The resolved parameter has a different type.
    #[error("parameter {index} is not a '{expected}'")]
    TypeMismatch {
        /// Requested index.
        index: usize,
        /// Requested type name.
        expected: &'static str,
    },
}

/// Errors that abort a request chain.
///
/// Every variant ends up in the application's error handler exactly once.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The middleware handed to `next` is no longer where the chain expects it.
    #[error(
        "middleware list is corrupted: current middleware at position {position} is not found in the list"
    )]
    ChainCorrupted {
        /// Position the middleware was expected at.
        position: usize,
    },

    /// An injectable needed by the chain could not be resolved.
    #[error(transparent)]
    Resolution(#[from] brass_core::Error),

    /// The method result could not be encoded as JSON.
    #[error("failed to serialize method result: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The response could not be written.
    #[error(transparent)]
    Http(#[from] HttpError),

    /// User code (middleware, interceptor, parameter resolver or method) failed.
    #[error(transparent)]
    Handler(BoxError),
}

impl ExecutionError {
    /// Wraps an error returned by user code, unwrapping errors that already
    /// came out of the chain.
    pub fn from_handler(error: BoxError) -> Self {
        match error.downcast::<ExecutionError>() {
            Ok(error) => *error,
            Err(error) => Self::Handler(error),
        }
    }

    /// Returns the user error if it is an `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            Self::Handler(error) => error.downcast_ref::<E>(),
            _ => None,
        }
    }

    /// Returns `true` for [`ExecutionError::ChainCorrupted`].
    pub fn is_chain_corrupted(&self) -> bool {
        matches!(self, Self::ChainCorrupted { .. })
    }
}

/// Result type for request execution.
pub type ExecutionResult<T> = Result<T, ExecutionError>;
