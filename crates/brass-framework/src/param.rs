//! Parameter resolvers feeding controller methods.
//!
//! A method declares an ordered list of [`ParamResolver`]s. Before the
//! method runs, all of them are resolved concurrently against the request
//! context and handed to the method as [`Params`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use brass_core::BoxError;
use futures::FutureExt;
use futures::future::{BoxFuture, ready};
use serde::de::DeserializeOwned;

use crate::error::ParamError;
use crate::execution::ExecutionContext;

/// A resolved parameter.
pub type ParamValue = Arc<dyn Any + Send + Sync>;

type ResolveFn = dyn Fn(Arc<ExecutionContext>) -> BoxFuture<'static, Result<ParamValue, BoxError>> + Send + Sync;

/// Produces one method argument from the request context.
#[derive(Clone)]
pub struct ParamResolver(Arc<ResolveFn>);

impl ParamResolver {
    /// Wraps an untyped resolver function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Arc<ExecutionContext>) -> BoxFuture<'static, Result<ParamValue, BoxError>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Resolves the parameter for `ctx`.
    pub fn resolve(&self, ctx: Arc<ExecutionContext>) -> BoxFuture<'static, Result<ParamValue, BoxError>> {
        (self.0)(ctx)
    }
}

impl fmt::Debug for ParamResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ParamResolver")
    }
}

// =============================================================================
// Built-in resolvers
// =============================================================================

/// A synchronous resolver.
pub fn resolver<T, F>(f: F) -> ParamResolver
where
    T: Any + Send + Sync,
    F: Fn(&ExecutionContext) -> Result<T, BoxError> + Send + Sync + 'static,
{
    ParamResolver::new(move |ctx| ready(f(&*ctx).map(|value| Arc::new(value) as ParamValue)).boxed())
}

/// An asynchronous resolver.
pub fn resolver_async<T, F, Fut>(f: F) -> ParamResolver
where
    T: Any + Send + Sync,
    F: Fn(Arc<ExecutionContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
{
    ParamResolver::new(move |ctx| {
        f(ctx)
            .map(|result| result.map(|value| Arc::new(value) as ParamValue))
            .boxed()
    })
}

/// The execution context itself, read back as [`ExecutionContext`].
pub fn context() -> ParamResolver {
    ParamResolver::new(|ctx| ready(Ok(ctx as ParamValue)).boxed())
}

/// The request, read back as [`HttpRequest`](crate::http::HttpRequest).
pub fn request() -> ParamResolver {
    ParamResolver::new(|ctx| ready(Ok(ctx.req_shared() as ParamValue)).boxed())
}

/// A path parameter, read back as `String`. Fails if the route has no
/// such parameter.
pub fn param(name: &'static str) -> ParamResolver {
    resolver(move |ctx| {
        ctx.req()
            .param(name)
            .map(str::to_owned)
            .ok_or_else(|| ParamError::MissingPathParam(name.to_owned()).into())
    })
}

/// A query parameter, read back as `Option<String>`.
pub fn query(name: &'static str) -> ParamResolver {
    resolver(move |ctx| Ok(ctx.req().query(name)))
}

/// A header, read back as `Option<String>`.
pub fn header(name: &'static str) -> ParamResolver {
    resolver(move |ctx| Ok(ctx.req().header(name).map(str::to_owned)))
}

/// The body decoded as JSON, read back as `T`.
pub fn json_body<T>() -> ParamResolver
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    resolver(|ctx| Ok(ctx.req().json::<T>()?))
}

/// The body as text, read back as `String`.
pub fn text_body() -> ParamResolver {
    resolver(|ctx| Ok(ctx.req().text()?))
}

// =============================================================================
// Params
// =============================================================================

/// The resolved arguments of a method, in declaration order.
#[derive(Clone, Default)]
pub struct Params {
    values: Vec<ParamValue>,
}

impl Params {
    pub fn new(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    /// Shared access to the argument at `index`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> Result<Arc<T>, ParamError> {
        let value = self.values.get(index).cloned().ok_or(ParamError::Index {
            index,
            len: self.values.len(),
        })?;
        value.downcast::<T>().map_err(|_| ParamError::TypeMismatch {
            index,
            expected: std::any::type_name::<T>(),
        })
    }

    /// Owned copy of the argument at `index`.
    pub fn take<T: Any + Clone + Send + Sync>(&self, index: usize) -> Result<T, ParamError> {
        self.get::<T>(index).map(|value| value.as_ref().clone())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Params").field("len", &self.values.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_typed_access() {
        let params = Params::new(vec![
            Arc::new("42".to_string()) as ParamValue,
            Arc::new(Some(3u8)) as ParamValue,
        ]);

        assert_eq!(params.take::<String>(0).unwrap(), "42");
        assert_eq!(*params.get::<Option<u8>>(1).unwrap(), Some(3));
        assert!(matches!(
            params.get::<u8>(0),
            Err(ParamError::TypeMismatch { index: 0, .. })
        ));
        assert!(matches!(params.get::<u8>(2), Err(ParamError::Index { index: 2, len: 2 })));
    }
}
