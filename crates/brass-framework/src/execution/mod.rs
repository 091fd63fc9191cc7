//! The request execution engine.
//!
//! For one request the engine builds an [`ExecutionContext`] from the
//! router's [`MatchResult`] and walks the chain:
//!
//! ```text
//! middleware[0] ─next─▶ middleware[1] ─next─▶ … ─next─▶ method
//!                                                      │
//!                            interceptor[0] ─next─▶ … ─next─▶ controller method
//! ```
//!
//! With no method matched the chain ends in the not-found handler. Any
//! failure aborts the chain and is handed to the error handler exactly once.

mod context;

use std::sync::Arc;

use brass_core::{Injector, Instance, Scope};
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, try_join, try_join_all};
use http::StatusCode;
use serde_json::Value;
use tracing::{Instrument, debug, error, info_span};

use crate::error::{ExecutionError, ExecutionResult};
use crate::fallback::{ErrorRef, NotFoundRef};
use crate::handler::{HandlerMatch, MatchResult, MethodHandler};
use crate::interceptor::{CallNext, Invocation};
use crate::middleware::Next;
use crate::param::Params;
use crate::tag::TagRegistry;

pub use context::{Cursor, ExecutionContext};

/// Input of one execution.
#[derive(Debug)]
pub struct ExecutionOptions {
    pub request: http::Request<Bytes>,
    pub matches: MatchResult,
    pub scope: Scope,
    /// Arbitrary environment exposed through [`ExecutionContext::env`].
    pub env: Option<Instance>,
}

/// Drives request chains. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    injector: Injector,
    tags: TagRegistry,
    not_found: NotFoundRef,
    error_handler: ErrorRef,
}

impl Engine {
    pub fn new(injector: Injector, tags: TagRegistry, not_found: NotFoundRef, error_handler: ErrorRef) -> Self {
        Self {
            injector,
            tags,
            not_found,
            error_handler,
        }
    }

    /// Runs the chain for one request and returns the final response.
    pub async fn execute(&self, options: ExecutionOptions) -> http::Response<Bytes> {
        let span = info_span!(
            "dispatch",
            method = %options.request.method(),
            path = %options.request.uri().path(),
        );

        async move {
            debug!("Handling request");
            let ExecutionOptions {
                request,
                matches,
                scope,
                env,
            } = options;
            let ctx = Arc::new(ExecutionContext::new(
                request,
                matches,
                scope,
                env,
                self.injector.clone(),
                self.tags.clone(),
            ));

            if let Err(err) = self.call(ctx.clone()).await {
                error!(error = %err, "Error during request handling");
                self.handle_error(&ctx, err).await;
            }

            let response = ctx.take_response();
            debug!(status = %response.status_code(), "Request handled");
            response.into_response()
        }
        .instrument(span)
        .await
    }

    /// Dispatches the handler under the context cursor.
    pub(crate) fn call(&self, ctx: Arc<ExecutionContext>) -> BoxFuture<'static, ExecutionResult<()>> {
        let engine = self.clone();
        async move {
            match ctx.current() {
                Cursor::End => {
                    let handler = engine.not_found.resolve(&engine.injector, ctx.scope()).await?;
                    handler
                        .on_not_found(ctx)
                        .await
                        .map_err(ExecutionError::from_handler)
                }
                Cursor::Middleware(position) => {
                    let current = ctx
                        .middlewares()
                        .get(position)
                        .cloned()
                        .ok_or(ExecutionError::ChainCorrupted { position })?;
                    let middleware = current
                        .handler
                        .middleware
                        .resolve(&engine.injector, ctx.scope())
                        .await?;

                    let next = Next::new(engine.clone(), ctx.clone(), position, current.handler);
                    middleware
                        .handle(ctx, next)
                        .await
                        .map_err(ExecutionError::from_handler)
                }
                Cursor::Method => match ctx.method().cloned() {
                    Some(matched) => engine.call_method(ctx, matched).await,
                    None => {
                        let handler = engine.not_found.resolve(&engine.injector, ctx.scope()).await?;
                        handler
                            .on_not_found(ctx)
                            .await
                            .map_err(ExecutionError::from_handler)
                    }
                },
            }
        }
        .boxed()
    }

    async fn call_method(
        &self,
        ctx: Arc<ExecutionContext>,
        matched: HandlerMatch<MethodHandler>,
    ) -> ExecutionResult<()> {
        let handler = matched.handler;
        let scope = ctx.scope().clone();

        let interceptors = try_join_all(
            handler
                .interceptors
                .iter()
                .map(|interceptor| interceptor.resolve(&self.injector, &scope)),
        );
        let controller = self.injector.resolve_async(handler.controller, &scope);
        let (interceptors, controller) = try_join(interceptors, controller).await?;

        let params = try_join_all(handler.params.iter().map(|param| param.resolve(ctx.clone())))
            .await
            .map_err(ExecutionError::from_handler)?;

        let invocation = Arc::new(Invocation {
            interceptors,
            controller,
            invoke: handler.invoke.clone(),
            params: Params::new(params),
        });
        let result: Value = CallNext::new(invocation, ctx.clone())
            .run()
            .await
            .map_err(ExecutionError::from_handler)?;

        ctx.res().json(&result)?;
        Ok(())
    }

    async fn handle_error(&self, ctx: &Arc<ExecutionContext>, err: ExecutionError) {
        let outcome = match self.error_handler.resolve(&self.injector, ctx.scope()).await {
            Ok(handler) => handler.on_error(ctx.clone(), err).await,
            Err(resolution) => Err(resolution.into()),
        };

        if let Err(failure) = outcome {
            error!(error = %failure, "Error handler failed");
            ctx.res()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text("Internal Server Error");
        }
    }
}

#[cfg(test)]
mod tests;
