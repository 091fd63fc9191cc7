//! # Brass Framework
//!
//! Controllers, routing and the request execution pipeline.
//!
//! This layer provides:
//! - Controller and method registries with merge-on-redeclare semantics
//! - A router with pluggable path matching and a priority policy
//! - The execution engine walking middleware, interceptors and the method
//! - Parameter resolvers, tags and the default fallback handlers
//! - [`Application`], the composition root, usable as a `tower::Service`
//!
//! Injection itself lives in `brass-core`; this crate only declares
//! controllers, middleware and interceptors as injectables and resolves them
//! per request.

pub mod app;
pub mod component;
pub mod controller;
pub mod error;
pub mod execution;
pub mod fallback;
pub mod handler;
pub mod http;
pub mod interceptor;
pub mod method;
pub mod middleware;
pub mod param;
pub mod registry;
pub mod router;
pub mod tag;

pub use app::{Application, ApplicationOptions};
pub use component::InjectRef;
pub use controller::{CONTROLLER_KEY, ControllerDeclaration, ControllerRegistry};
pub use error::{ExecutionError, ExecutionResult, HttpError, ParamError};
pub use execution::{Cursor, Engine, ExecutionContext, ExecutionOptions};
pub use fallback::{DefaultHandler, ErrorHandler, ErrorRef, NotFoundHandler, NotFoundRef, error_fn, not_found_fn};
pub use handler::{Handler, HandlerMatch, MatchResult, MethodFn, MethodHandler, MiddlewareHandler};
pub use self::http::{Blob, HttpRequest, HttpResponse, HttpVerb, PathParams};
pub use interceptor::{CallNext, Interceptor, InterceptorRef, interceptor_fn};
pub use method::{METHOD_KEY, METHOD_LIST_KEY, MethodDeclaration, MethodOptions, MethodRegistry};
pub use middleware::{Middleware, MiddlewareRef, Next, middleware_fn};
pub use param::{ParamResolver, ParamValue, Params};
pub use registry::Registry;
pub use router::{PathMatcher, RawMatch, RegexMatcher, Router, join_paths, wildcard_path};
pub use tag::{TAG_KEY, TagMode, TagRegistry};

pub use async_trait::async_trait;
