//! Route handlers produced from controller and method declarations.

use std::fmt;
use std::sync::Arc;

use brass_core::{BoxError, Instance, MethodTarget, Target};
use futures::future::BoxFuture;
use serde_json::Value;

use crate::http::{HttpVerb, PathParams};
use crate::interceptor::InterceptorRef;
use crate::middleware::MiddlewareRef;
use crate::param::{ParamResolver, Params};

/// A controller method bound to its controller type: takes the resolved
/// controller instance and the resolved parameters.
pub type MethodFn = Arc<dyn Fn(Instance, Params) -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// A routable controller method.
#[derive(Clone)]
pub struct MethodHandler {
    pub verb: HttpVerb,
    pub path: String,
    /// The highest priority wins when several method handlers match.
    pub priority: i32,
    pub target: MethodTarget,
    pub controller: Target,
    /// Global, controller and method interceptors, outermost first.
    pub interceptors: Vec<InterceptorRef>,
    pub params: Vec<ParamResolver>,
    pub invoke: MethodFn,
}

impl fmt::Debug for MethodHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandler")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("target", &self.target)
            .field("interceptors", &self.interceptors)
            .finish_non_exhaustive()
    }
}

/// A middleware mounted at a path pattern.
#[derive(Debug, Clone)]
pub struct MiddlewareHandler {
    pub path: String,
    /// Higher priority middleware runs first.
    pub priority: i32,
    pub middleware: MiddlewareRef,
}

/// Anything the router can hold.
#[derive(Debug, Clone)]
pub enum Handler {
    Method(MethodHandler),
    Middleware(MiddlewareHandler),
}

impl Handler {
    pub fn path(&self) -> &str {
        match self {
            Self::Method(h) => &h.path,
            Self::Middleware(h) => &h.path,
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Self::Method(h) => h.priority,
            Self::Middleware(h) => h.priority,
        }
    }
}

/// A handler matched against a concrete request.
#[derive(Debug)]
pub struct HandlerMatch<H> {
    pub handler: Arc<H>,
    pub params: PathParams,
}

impl<H> Clone for HandlerMatch<H> {
    fn clone(&self) -> Self {
        Self {
            handler: self.handler.clone(),
            params: self.params.clone(),
        }
    }
}

/// Everything the router found for a request.
#[derive(Debug)]
pub struct MatchResult {
    /// Matched middleware in execution order.
    pub middlewares: Vec<HandlerMatch<MiddlewareHandler>>,
    /// The selected method handler, if any route matched.
    pub method: Option<HandlerMatch<MethodHandler>>,
}

impl MatchResult {
    /// A result with nothing matched.
    pub fn empty() -> Self {
        Self {
            middlewares: Vec::new(),
            method: None,
        }
    }
}
