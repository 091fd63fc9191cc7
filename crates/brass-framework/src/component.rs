//! Typed references to injectables implementing a framework trait.

use std::fmt;
use std::sync::Arc;

use brass_core::{CoreResult, Injector, Instance, ResolutionError, Scope, Target};

/// Identifies an injectable that is used through the trait object `T`.
///
/// Created through the trait-specific constructors, e.g.
/// [`MiddlewareRef::of`](crate::middleware::MiddlewareRef::of). Carries the
/// target plus the cast from the resolved instance to `Arc<T>`.
pub struct InjectRef<T: ?Sized> {
    target: Target,
    cast: fn(Instance) -> Option<Arc<T>>,
}

impl<T: ?Sized + 'static> InjectRef<T> {
    pub(crate) fn new(target: Target, cast: fn(Instance) -> Option<Arc<T>>) -> Self {
        Self { target, cast }
    }

    /// The referenced injectable.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Resolves the injectable in `scope` and casts it to `T`.
    pub async fn resolve(&self, injector: &Injector, scope: &Scope) -> CoreResult<Arc<T>> {
        let instance = injector.resolve_async(self.target, scope).await?;
        (self.cast)(instance).ok_or_else(|| {
            ResolutionError::TypeMismatch {
                target: self.target.to_string(),
                expected: std::any::type_name::<T>(),
            }
            .into()
        })
    }
}

impl<T: ?Sized> Clone for InjectRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for InjectRef<T> {}

impl<T: ?Sized> PartialEq for InjectRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target
    }
}

impl<T: ?Sized> Eq for InjectRef<T> {}

impl<T: ?Sized> fmt::Debug for InjectRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InjectRef").field(&self.target).finish()
    }
}
