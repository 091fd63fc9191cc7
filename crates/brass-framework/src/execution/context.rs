use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use brass_core::{CoreResult, Injector, Instance, Scope};
use http::StatusCode;
use parking_lot::{Mutex, MutexGuard};

use crate::handler::{HandlerMatch, MatchResult, MethodHandler, MiddlewareHandler};
use crate::http::{HttpRequest, HttpResponse};
use crate::tag::{TagMode, TagRegistry};

/// Position of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// The middleware at this index of the matched list.
    Middleware(usize),
    /// The matched method.
    Method,
    /// Nothing left to run; the not-found handler answers.
    End,
}

/// State of one in-flight request, shared by every handler of its chain.
pub struct ExecutionContext {
    req: Arc<HttpRequest>,
    res: Mutex<HttpResponse>,
    data: Mutex<HashMap<String, Instance>>,
    env: Option<Instance>,
    scope: Scope,
    injector: Injector,
    tags: TagRegistry,
    middlewares: Vec<HandlerMatch<MiddlewareHandler>>,
    method: Option<HandlerMatch<MethodHandler>>,
    current: Mutex<Cursor>,
}

impl ExecutionContext {
    /// Builds the context for `request`. The request sees the path
    /// parameters of the matched method.
    pub fn new(
        request: http::Request<bytes::Bytes>,
        matches: MatchResult,
        scope: Scope,
        env: Option<Instance>,
        injector: Injector,
        tags: TagRegistry,
    ) -> Self {
        let MatchResult { middlewares, method } = matches;
        let params = method.as_ref().map(|m| m.params.clone()).unwrap_or_default();
        let current = if !middlewares.is_empty() {
            Cursor::Middleware(0)
        } else if method.is_some() {
            Cursor::Method
        } else {
            Cursor::End
        };

        Self {
            req: Arc::new(HttpRequest::new(request, params)),
            res: Mutex::new(HttpResponse::new()),
            data: Mutex::new(HashMap::new()),
            env,
            scope,
            injector,
            tags,
            middlewares,
            method,
            current: Mutex::new(current),
        }
    }

    // ─── Request / Response ──────────────────────────────────────────────

    pub fn req(&self) -> &HttpRequest {
        &self.req
    }

    pub(crate) fn req_shared(&self) -> Arc<HttpRequest> {
        self.req.clone()
    }

    /// Locks the response. Do not hold the guard across an `.await`.
    pub fn res(&self) -> MutexGuard<'_, HttpResponse> {
        self.res.lock()
    }

    pub fn set_status(&self, status: StatusCode) {
        self.res.lock().status(status);
    }

    pub(crate) fn take_response(&self) -> HttpResponse {
        std::mem::take(&mut *self.res.lock())
    }

    // ─── Data bag / environment ──────────────────────────────────────────

    /// Stores a value for later handlers of this request.
    pub fn set_data<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) {
        self.data.lock().insert(key.into(), Arc::new(value));
    }

    /// Reads a value stored with [`set_data`](Self::set_data).
    pub fn data<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.data.lock().get(key).cloned()?.downcast::<T>().ok()
    }

    /// The environment passed to `Application::fetch`, if it is a `T`.
    pub fn env<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.env.clone()?.downcast::<T>().ok()
    }

    // ─── Injection ───────────────────────────────────────────────────────

    /// The resolution scope of this request.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Resolves `T` in the scope of this request.
    pub async fn resolve<T: Any + Send + Sync>(&self) -> CoreResult<Arc<T>> {
        self.injector.get_async::<T>(&self.scope).await
    }

    // ─── Chain ───────────────────────────────────────────────────────────

    /// Matched middleware in execution order.
    pub fn middlewares(&self) -> &[HandlerMatch<MiddlewareHandler>] {
        &self.middlewares
    }

    /// The matched method, if any.
    pub fn method(&self) -> Option<&HandlerMatch<MethodHandler>> {
        self.method.as_ref()
    }

    /// The handler currently running.
    pub fn current(&self) -> Cursor {
        *self.current.lock()
    }

    pub(crate) fn set_current(&self, cursor: Cursor) {
        *self.current.lock() = cursor;
    }

    /// Reads a tag of the matched method or its controller.
    pub fn tag<T: Any + Send + Sync>(&self, name: &str, mode: TagMode) -> Option<Arc<T>> {
        let method = self.method.as_ref().map(|m| &m.handler);
        self.tags.lookup::<T>(
            name,
            mode,
            method.map(|h| h.target),
            method.map(|h| h.controller),
        )
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("method", self.req.method())
            .field("path", &self.req.path())
            .field("scope", &self.scope)
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}
