//! Interceptors wrapping a single method invocation.
//!
//! Interceptors of a method run outermost first: global, then controller,
//! then method interceptors. Each receives a [`CallNext`] that runs the
//! next interceptor, or the method itself once the list is exhausted. An
//! interceptor may skip `next` to short-circuit, or transform its result.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use brass_core::{BoxError, CoreResult, Injector, Instance, Target};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::component::InjectRef;
use crate::execution::ExecutionContext;
use crate::handler::MethodFn;
use crate::param::Params;

/// A method-level wrapper.
#[async_trait]
pub trait Interceptor: Send + Sync + 'static {
    /// Intercepts the invocation. The returned value replaces the method result.
    async fn intercept(&self, ctx: Arc<ExecutionContext>, next: CallNext) -> Result<Value, BoxError>;
}

/// Reference to an injectable [`Interceptor`].
pub type InterceptorRef = InjectRef<dyn Interceptor>;

impl InjectRef<dyn Interceptor> {
    /// Reference to the injectable `I`.
    pub fn of<I: Interceptor>() -> Self {
        Self::new(Target::of::<I>(), |instance| {
            instance.downcast::<I>().ok().map(|i| i as Arc<dyn Interceptor>)
        })
    }
}

/// Everything needed to run the method once the interceptors let it through.
pub(crate) struct Invocation {
    pub(crate) interceptors: Vec<Arc<dyn Interceptor>>,
    pub(crate) controller: Instance,
    pub(crate) invoke: MethodFn,
    pub(crate) params: Params,
}

/// Continuation handed to an interceptor.
pub struct CallNext {
    invocation: Arc<Invocation>,
    ctx: Arc<ExecutionContext>,
    index: usize,
}

impl CallNext {
    pub(crate) fn new(invocation: Arc<Invocation>, ctx: Arc<ExecutionContext>) -> Self {
        Self {
            invocation,
            ctx,
            index: 0,
        }
    }

    /// Number of interceptors still to run before the method.
    pub fn remaining(&self) -> usize {
        self.invocation.interceptors.len().saturating_sub(self.index)
    }

    /// Runs the next interceptor, or the method if none is left.
    pub fn run(self) -> BoxFuture<'static, Result<Value, BoxError>> {
        let Self {
            invocation,
            ctx,
            index,
        } = self;

        match invocation.interceptors.get(index).cloned() {
            Some(interceptor) => async move {
                let next = CallNext {
                    invocation,
                    ctx: ctx.clone(),
                    index: index + 1,
                };
                interceptor.intercept(ctx, next).await
            }
            .boxed(),
            None => (invocation.invoke)(invocation.controller.clone(), invocation.params.clone()),
        }
    }
}

// =============================================================================
// Closure interceptor
// =============================================================================

struct FnInterceptor<F>(Arc<F>);

#[async_trait]
impl<F, Fut> Interceptor for FnInterceptor<F>
where
    F: Fn(Arc<ExecutionContext>, CallNext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    async fn intercept(&self, ctx: Arc<ExecutionContext>, next: CallNext) -> Result<Value, BoxError> {
        (self.0)(ctx, next).await
    }
}

/// Declares a closure as an injectable interceptor and returns its reference.
pub fn interceptor_fn<F, Fut>(injector: &Injector, f: F) -> CoreResult<InterceptorRef>
where
    F: Fn(Arc<ExecutionContext>, CallNext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
{
    let f = Arc::new(f);
    injector.declare_constructor::<FnInterceptor<F>, _>([], move |_| Ok(FnInterceptor(f.clone())))?;
    Ok(InterceptorRef::of::<FnInterceptor<F>>())
}
