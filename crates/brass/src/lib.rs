//! # Brass
//!
//! A dependency-injected, controller based HTTP framework for Rust.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────────┐     ┌────────┐     ┌────────────────────────────────────┐
//! │ Transport │────▶│ Application │────▶│ Router │────▶│ middleware → interceptors → method │
//! │  (axum)   │     │   (fetch)   │     │        │     └────────────────────────────────────┘
//! └───────────┘     └─────────────┘     └────────┘                    │
//!                                                                     ▼
//!                                                              Injector (scoped)
//! ```
//!
//! - **Injector**: scoped, single-flight resolution of declared injectables,
//!   including ones that initialize asynchronously
//! - **Controllers**: injectables owning a base path and a list of methods
//! - **Middleware / Interceptors**: onion-style wrappers around the matched method
//! - **Application**: routes a request through the chain and always produces a response
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brass::prelude::*;
//!
//! struct Hello;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = Registry::new();
//!     registry.controllers().declare_controller::<Hello, _>("/hello", [], |_| Ok(Hello))?;
//!     registry.methods().bind::<Hello, _, _, _>(
//!         "greet",
//!         MethodOptions::get("/:name").params([param("name")]),
//!         |_, params| async move {
//!             let name = params.take::<String>(0)?;
//!             Ok::<_, BoxError>(format!("Hello, {name}!"))
//!         },
//!     )?;
//!
//!     Server::builder()
//!         .registry(registry)
//!         .options(ApplicationOptions::new().controller(Target::of::<Hello>()))
//!         .build()?
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config` *(default)*: TOML configuration files
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log format
//! - `http-server` *(default)*: axum HTTP server

pub use brass_core as core;
pub use brass_framework as framework;
pub use brass_runtime as runtime;
pub use brass_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use brass::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use brass_runtime::{BrassConfig, Server};

    // Dependency injection
    pub use brass_core::{BoxError, Dependencies, Injector, Scope, Target};

    // Composition root
    pub use brass_framework::{Application, ApplicationOptions, Registry};

    // Controllers and methods
    pub use brass_framework::{MethodOptions, TagMode};

    // Parameters
    pub use brass_framework::Params;
    pub use brass_framework::param::{context, header, json_body, param, query, request, resolver, resolver_async, text_body};

    // Request pipeline
    pub use brass_framework::{
        CallNext, ExecutionContext, Interceptor, InterceptorRef, Middleware, MiddlewareRef, Next,
        interceptor_fn, middleware_fn,
    };
    pub use brass_framework::{ErrorHandler, ErrorRef, NotFoundHandler, NotFoundRef, error_fn, not_found_fn};

    // Re-exported so `#[async_trait]` impls work without a direct dependency
    pub use brass_framework::async_trait;
}
