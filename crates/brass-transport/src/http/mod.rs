//! HTTP transport.

mod server;

pub use server::{ClientInfo, router, serve, serve_with_shutdown, shutdown_signal};
