//! Middleware wrapping the whole request chain.
//!
//! A middleware receives the request context and a [`Next`] continuation.
//! Running `next` dispatches the rest of the chain (the following
//! middleware, or the matched method); not running it ends the chain with
//! whatever response the middleware has written.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use brass_core::{BoxError, CoreResult, Injector, Target};
use tracing::trace;

use crate::component::InjectRef;
use crate::execution::{Cursor, Engine, ExecutionContext};
use crate::handler::MiddlewareHandler;
use crate::error::ExecutionError;

/// A request-level wrapper.
///
/// # Example
///
/// ```rust,ignore
/// struct Timing;
///
/// #[async_trait]
/// impl Middleware for Timing {
///     async fn handle(&self, ctx: Arc<ExecutionContext>, next: Next) -> Result<(), BoxError> {
///         let started = Instant::now();
///         next.run().await?;
///         ctx.res().header("x-elapsed-ms", &started.elapsed().as_millis().to_string())?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    /// Handles the request, optionally running the rest of the chain.
    async fn handle(&self, ctx: Arc<ExecutionContext>, next: Next) -> Result<(), BoxError>;
}

/// Reference to an injectable [`Middleware`].
pub type MiddlewareRef = InjectRef<dyn Middleware>;

impl InjectRef<dyn Middleware> {
    /// Reference to the injectable `M`.
    pub fn of<M: Middleware>() -> Self {
        Self::new(Target::of::<M>(), |instance| {
            instance.downcast::<M>().ok().map(|m| m as Arc<dyn Middleware>)
        })
    }
}

// =============================================================================
// Next
// =============================================================================

/// Continuation handed to a middleware.
///
/// Remembers the position of the middleware it was handed to; running it
/// advances the context cursor past that position and dispatches.
pub struct Next {
    engine: Engine,
    ctx: Arc<ExecutionContext>,
    position: usize,
    handler: Arc<MiddlewareHandler>,
}

impl Next {
    pub(crate) fn new(
        engine: Engine,
        ctx: Arc<ExecutionContext>,
        position: usize,
        handler: Arc<MiddlewareHandler>,
    ) -> Self {
        Self {
            engine,
            ctx,
            position,
            handler,
        }
    }

    /// Position of the current middleware in the matched list.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Runs the rest of the chain.
    pub async fn run(self) -> Result<(), BoxError> {
        let Self {
            engine,
            ctx,
            position,
            handler,
        } = self;

        let middlewares = ctx.middlewares();
        let located = middlewares
            .get(position)
            .is_some_and(|current| Arc::ptr_eq(&current.handler, &handler));
        if !located {
            return Err(ExecutionError::ChainCorrupted { position }.into());
        }

        let successor = if position + 1 < middlewares.len() {
            Cursor::Middleware(position + 1)
        } else if ctx.method().is_some() {
            Cursor::Method
        } else {
            Cursor::End
        };
        trace!(from = position, to = ?successor, "Advancing middleware chain");
        ctx.set_current(successor);

        engine.call(ctx).await.map_err(Into::into)
    }
}

// =============================================================================
// Closure middleware
// =============================================================================

struct FnMiddleware<F>(Arc<F>);

#[async_trait]
impl<F, Fut> Middleware for FnMiddleware<F>
where
    F: Fn(Arc<ExecutionContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn handle(&self, ctx: Arc<ExecutionContext>, next: Next) -> Result<(), BoxError> {
        (self.0)(ctx, next).await
    }
}

/// Declares a closure as an injectable middleware and returns its reference.
///
/// The closure cannot receive injected dependencies; declare a type
/// implementing [`Middleware`] for that. Each closure type can be declared
/// once.
pub fn middleware_fn<F, Fut>(injector: &Injector, f: F) -> CoreResult<MiddlewareRef>
where
    F: Fn(Arc<ExecutionContext>, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let f = Arc::new(f);
    injector.declare_constructor::<FnMiddleware<F>, _>([], move |_| Ok(FnMiddleware(f.clone())))?;
    Ok(MiddlewareRef::of::<FnMiddleware<F>>())
}
