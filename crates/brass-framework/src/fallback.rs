//! Not-found and error handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use brass_core::{BoxError, CoreResult, Injector, Target};
use http::StatusCode;
use serde_json::json;

use crate::component::InjectRef;
use crate::error::ExecutionError;
use crate::execution::ExecutionContext;

/// Writes the response when no method handler matched.
#[async_trait]
pub trait NotFoundHandler: Send + Sync + 'static {
    async fn on_not_found(&self, ctx: Arc<ExecutionContext>) -> Result<(), BoxError>;
}

/// Writes the response when the chain failed.
#[async_trait]
pub trait ErrorHandler: Send + Sync + 'static {
    async fn on_error(&self, ctx: Arc<ExecutionContext>, error: ExecutionError) -> Result<(), BoxError>;
}

/// Reference to an injectable [`NotFoundHandler`].
pub type NotFoundRef = InjectRef<dyn NotFoundHandler>;

/// Reference to an injectable [`ErrorHandler`].
pub type ErrorRef = InjectRef<dyn ErrorHandler>;

impl InjectRef<dyn NotFoundHandler> {
    /// Reference to the injectable `H`.
    pub fn of<H: NotFoundHandler>() -> Self {
        Self::new(Target::of::<H>(), |instance| {
            instance.downcast::<H>().ok().map(|h| h as Arc<dyn NotFoundHandler>)
        })
    }
}

impl InjectRef<dyn ErrorHandler> {
    /// Reference to the injectable `H`.
    pub fn of<H: ErrorHandler>() -> Self {
        Self::new(Target::of::<H>(), |instance| {
            instance.downcast::<H>().ok().map(|h| h as Arc<dyn ErrorHandler>)
        })
    }
}

/// Answers `404 {"error":"Not Found"}` and `500 {"error":"Internal Server Error"}`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHandler;

#[async_trait]
impl NotFoundHandler for DefaultHandler {
    async fn on_not_found(&self, ctx: Arc<ExecutionContext>) -> Result<(), BoxError> {
        ctx.res()
            .status(StatusCode::NOT_FOUND)
            .json(&json!({ "error": "Not Found" }))?;
        Ok(())
    }
}

#[async_trait]
impl ErrorHandler for DefaultHandler {
    async fn on_error(&self, ctx: Arc<ExecutionContext>, _error: ExecutionError) -> Result<(), BoxError> {
        ctx.res()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .json(&json!({ "error": "Internal Server Error" }))?;
        Ok(())
    }
}

// =============================================================================
// Closure handlers
// =============================================================================

struct FnNotFound<F>(Arc<F>);

#[async_trait]
impl<F, Fut> NotFoundHandler for FnNotFound<F>
where
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn on_not_found(&self, ctx: Arc<ExecutionContext>) -> Result<(), BoxError> {
        (self.0)(ctx).await
    }
}

struct FnError<F>(Arc<F>);

#[async_trait]
impl<F, Fut> ErrorHandler for FnError<F>
where
    F: Fn(Arc<ExecutionContext>, ExecutionError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn on_error(&self, ctx: Arc<ExecutionContext>, error: ExecutionError) -> Result<(), BoxError> {
        (self.0)(ctx, error).await
    }
}

/// Declares a closure as an injectable not-found handler.
pub fn not_found_fn<F, Fut>(injector: &Injector, f: F) -> CoreResult<NotFoundRef>
where
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let f = Arc::new(f);
    injector.declare_constructor::<FnNotFound<F>, _>([], move |_| Ok(FnNotFound(f.clone())))?;
    Ok(NotFoundRef::of::<FnNotFound<F>>())
}

/// Declares a closure as an injectable error handler.
pub fn error_fn<F, Fut>(injector: &Injector, f: F) -> CoreResult<ErrorRef>
where
    F: Fn(Arc<ExecutionContext>, ExecutionError) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let f = Arc::new(f);
    injector.declare_constructor::<FnError<F>, _>([], move |_| Ok(FnError(f.clone())))?;
    Ok(ErrorRef::of::<FnError<F>>())
}
