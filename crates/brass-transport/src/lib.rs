//! # Brass Transport
//!
//! Binds a [`brass_framework::Application`] to the network.
//!
//! Every transport follows the same contract: turn the platform request into
//! an `http::Request<Bytes>`, call [`Application::fetch`] with an optional
//! environment, and write back the returned response.
//!
//! ## Feature Flags
//!
//! - `http-server`: an axum based HTTP server ([`http::serve`])
//!
//! [`Application::fetch`]: brass_framework::Application::fetch

pub mod error;

#[cfg(feature = "http-server")]
pub mod http;

pub use error::{TransportError, TransportResult};

#[cfg(feature = "http-server")]
pub use self::http::{ClientInfo, router, serve, serve_with_shutdown, shutdown_signal};
