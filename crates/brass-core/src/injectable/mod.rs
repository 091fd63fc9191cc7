//! Injectable declarations and the scoped resolver.
//!
//! A target is declared once with an ordered list of dependencies and a
//! [`Factory`]. The [`Injector`] then hands out one instance per
//! `(target, scope)`:
//!
//! - [`Injector::resolve`] is synchronous and fails if construction would
//!   have to wait.
//! - [`Injector::resolve_async`] awaits asynchronous initializers and shares a
//!   single in-flight construction between concurrent callers.
//! - [`Injector::preload`] warms the cache so later synchronous resolutions
//!   succeed.
//!
//! # Example
//!
//! ```rust,ignore
//! let injector = Injector::new();
//! injector.declare_async::<Database, _, _>([], |_| async { Database::connect().await })?;
//! injector.declare_constructor::<UserService, _>([Target::of::<Database>()], |deps| {
//!     Ok(UserService::new(deps.get::<Database>(0)?))
//! })?;
//!
//! injector.preload([Target::of::<UserService>()], &Scope::DEFAULT).await?;
//! let users = injector.get::<UserService>(&Scope::DEFAULT)?;
//! ```

mod declaration;
mod injector;

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::error::{BoxError, CoreResult, ResolutionError};
use crate::target::Target;

pub use declaration::InjectableDeclaration;
pub use injector::{INJECTABLE_KEY, Injector};

/// A type-erased resolved instance.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Downcasts a resolved instance of `target` to `T`.
pub fn downcast<T: Any + Send + Sync>(target: Target, instance: Instance) -> CoreResult<Arc<T>> {
    instance.downcast::<T>().map_err(|_| {
        ResolutionError::TypeMismatch {
            target: target.to_string(),
            expected: std::any::type_name::<T>(),
        }
        .into()
    })
}

// =============================================================================
// Dependencies
// =============================================================================

/// The resolved dependencies of a target, in declaration order.
#[derive(Clone)]
pub struct Dependencies {
    owner: Target,
    targets: Vec<Target>,
    instances: Vec<Instance>,
}

impl Dependencies {
    pub(crate) fn new(owner: Target, targets: Vec<Target>, instances: Vec<Instance>) -> Self {
        Self {
            owner,
            targets,
            instances,
        }
    }

    /// Returns the dependency at `index` as `T`.
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> CoreResult<Arc<T>> {
        let instance = self.instance(index)?.clone();
        downcast(self.targets[index], instance)
    }

    /// Returns the untyped dependency at `index`.
    pub fn instance(&self, index: usize) -> CoreResult<&Instance> {
        self.instances.get(index).ok_or_else(|| {
            ResolutionError::DependencyIndex {
                target: self.owner.to_string(),
                index,
                len: self.instances.len(),
            }
            .into()
        })
    }

    /// Number of dependencies.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Returns `true` if the target has no dependencies.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl fmt::Debug for Dependencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependencies")
            .field("owner", &self.owner)
            .field("targets", &self.targets)
            .finish()
    }
}

// =============================================================================
// Factory
// =============================================================================

/// Outcome of an initializer: either a value right away or a future.
pub enum Initialization {
    /// The instance (or the failure) is available immediately.
    Ready(Result<Instance, BoxError>),
    /// The instance will be available once the future completes.
    Pending(BoxFuture<'static, Result<Instance, BoxError>>),
}

impl Initialization {
    /// Completes immediately with `value`.
    pub fn ready<T: Any + Send + Sync>(value: T) -> Self {
        Self::Ready(Ok(Arc::new(value)))
    }

    /// Fails immediately with `error`.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        Self::Ready(Err(error.into()))
    }

    /// Completes once `future` does.
    pub fn pending<T, Fut>(future: Fut) -> Self
    where
        T: Any + Send + Sync,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self::Pending(future.map(|result| result.map(|value| Arc::new(value) as Instance)).boxed())
    }

    /// Returns `true` for [`Initialization::Pending`].
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

type ConstructFn = dyn Fn(Dependencies) -> Result<Instance, BoxError> + Send + Sync;
type InitializeFn = dyn Fn(Dependencies) -> Initialization + Send + Sync;

/// How a target is built from its resolved dependencies.
///
/// Factories run while the slot of their `(target, scope)` is locked.
/// Resolving that same pair from inside the factory on the same thread
/// fails with [`ResolutionError::Recursive`](crate::error::ResolutionError::Recursive);
/// resolving it from another thread and blocking on the result deadlocks.
#[derive(Clone)]
pub enum Factory {
    /// Builds the instance directly and synchronously.
    Construct(Arc<ConstructFn>),
    /// Runs an initializer that may complete asynchronously.
    Initialize(Arc<InitializeFn>),
}

impl Factory {
    /// Synchronous constructor.
    pub fn constructor<T, F>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::Construct(Arc::new(move |deps| f(deps).map(|value| Arc::new(value) as Instance)))
    }

    /// Initializer that decides per call whether it completes synchronously.
    pub fn initializer<F>(f: F) -> Self
    where
        F: Fn(Dependencies) -> Initialization + Send + Sync + 'static,
    {
        Self::Initialize(Arc::new(f))
    }

    /// Initializer that always completes asynchronously.
    pub fn async_initializer<T, F, Fut>(f: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        Self::Initialize(Arc::new(move |deps| Initialization::pending(f(deps))))
    }

    /// Returns `true` if the factory is an initializer.
    pub fn is_initializer(&self) -> bool {
        matches!(self, Self::Initialize(_))
    }
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Construct(_) => f.write_str("Factory::Construct"),
            Self::Initialize(_) => f.write_str("Factory::Initialize"),
        }
    }
}
