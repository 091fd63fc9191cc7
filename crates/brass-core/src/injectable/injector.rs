use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Weak};

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use tracing::{debug, warn};

use super::declaration::{InjectableDeclaration, SharedInit, Slot};
use super::{Dependencies, Factory, Initialization, Instance, downcast};
use crate::error::{BoxError, CoreResult, DeclarationError, Error, ResolutionError};
use crate::metadata::{MetadataKey, MetadataStore};
use crate::scope::Scope;
use crate::target::Target;

/// Metadata key under which injectable declarations are stored.
pub const INJECTABLE_KEY: MetadataKey = MetadataKey::new("brass.injectable");

const KIND: &str = "injectable";

thread_local! {
    /// `(declaration, scope)` pairs whose factory is running on this thread.
    static CONSTRUCTING: RefCell<Vec<(usize, Scope)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a factory as running on the current thread until dropped.
struct ConstructGuard;

impl ConstructGuard {
    fn enter(decl: &Arc<InjectableDeclaration>, scope: &Scope) -> Self {
        CONSTRUCTING.with_borrow_mut(|running| running.push((Arc::as_ptr(decl) as usize, scope.clone())));
        Self
    }
}

impl Drop for ConstructGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with_borrow_mut(|running| {
            running.pop();
        });
    }
}

/// Fails when the factory of `decl` for `scope` is already running on this
/// thread. Taking the slot lock from inside it would deadlock.
fn check_reentry(decl: &Arc<InjectableDeclaration>, scope: &Scope) -> CoreResult<()> {
    let key = Arc::as_ptr(decl) as usize;
    let reentered = CONSTRUCTING.with_borrow(|running| running.iter().any(|(k, s)| *k == key && s == scope));
    if reentered {
        return Err(ResolutionError::Recursive {
            target: decl.target.to_string(),
            scope: scope.to_string(),
        }
        .into());
    }
    Ok(())
}

/// Result of starting a construction while holding the slot lock.
enum Started {
    Ready(Instance),
    Pending(SharedInit),
}

/// Declares injectables and resolves their scoped singleton instances.
///
/// Cheap to clone; clones share the same [`MetadataStore`].
#[derive(Clone, Default)]
pub struct Injector {
    metadata: Arc<MetadataStore>,
}

impl Injector {
    /// Creates an injector backed by a fresh store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an injector backed by `metadata`.
    pub fn with_metadata(metadata: Arc<MetadataStore>) -> Self {
        Self { metadata }
    }

    /// The backing metadata store.
    pub fn metadata(&self) -> &Arc<MetadataStore> {
        &self.metadata
    }

    // =========================================================================
    // Declaration
    // =========================================================================

    /// Declares `target` with its dependencies and factory.
    ///
    /// Fails with [`DeclarationError::AlreadyDeclared`] if `target` was
    /// declared before.
    pub fn declare(
        &self,
        target: Target,
        injects: impl IntoIterator<Item = Target>,
        factory: Factory,
    ) -> CoreResult<()> {
        let mut inserted = false;
        self.metadata.get_or_init(
            target,
            INJECTABLE_KEY,
            || {
                inserted = true;
                InjectableDeclaration::new(target, injects.into_iter().collect(), factory)
            },
            &Scope::DEFAULT,
        );

        if !inserted {
            return Err(DeclarationError::already_declared(target, KIND).into());
        }
        debug!(injectable = %target, "Declared injectable");
        Ok(())
    }

    /// Declares `T` with a synchronous constructor.
    pub fn declare_constructor<T, F>(&self, injects: impl IntoIterator<Item = Target>, f: F) -> CoreResult<()>
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.declare(Target::of::<T>(), injects, Factory::constructor(f))
    }

    /// Declares `T` with an initializer that may complete asynchronously.
    pub fn declare_initializer<T, F>(&self, injects: impl IntoIterator<Item = Target>, f: F) -> CoreResult<()>
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Initialization + Send + Sync + 'static,
    {
        self.declare(Target::of::<T>(), injects, Factory::initializer(f))
    }

    /// Declares `T` with an asynchronous initializer.
    pub fn declare_async<T, F, Fut>(&self, injects: impl IntoIterator<Item = Target>, f: F) -> CoreResult<()>
    where
        T: Any + Send + Sync,
        F: Fn(Dependencies) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, BoxError>> + Send + 'static,
    {
        self.declare(Target::of::<T>(), injects, Factory::async_initializer(f))
    }

    /// Makes an existing value injectable. Every scope receives its own clone.
    pub fn provide<T>(&self, value: T) -> CoreResult<()>
    where
        T: Any + Clone + Send + Sync,
    {
        self.declare_constructor::<T, _>([], move |_| Ok(value.clone()))
    }

    /// Returns `true` if `target` was declared.
    pub fn is_declared(&self, target: Target) -> bool {
        self.metadata.contains(target, INJECTABLE_KEY, &Scope::DEFAULT)
    }

    /// Returns the declaration of `target`.
    pub fn declaration(&self, target: Target) -> CoreResult<Arc<InjectableDeclaration>> {
        self.metadata
            .get::<InjectableDeclaration>(target, INJECTABLE_KEY, &Scope::DEFAULT)
            .ok_or_else(|| DeclarationError::not_declared(target, KIND).into())
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolves `target` in `scope` without waiting.
    ///
    /// Fails with a [`ResolutionError`] if the target (or one of its
    /// dependencies) needs an asynchronous initialization that has not
    /// completed yet. An initialization started here keeps running on the
    /// current tokio runtime, if any, so a later call can succeed.
    pub fn resolve(&self, target: Target, scope: &Scope) -> CoreResult<Instance> {
        let decl = self.declaration(target)?;
        check_reentry(&decl, scope)?;
        if let Some(instance) = decl.instance(scope) {
            return Ok(instance);
        }

        let instances = decl
            .injects
            .iter()
            .map(|dep| self.resolve(*dep, scope))
            .collect::<CoreResult<Vec<_>>>()?;
        let deps = Dependencies::new(target, decl.injects.clone(), instances);

        let started = {
            let mut slots = decl.slots.lock();
            match slots.get(scope) {
                Some(Slot::Ready(instance)) => return Ok(instance.clone()),
                Some(Slot::Pending(_)) => {
                    return Err(ResolutionError::Pending {
                        target: target.to_string(),
                    }
                    .into());
                }
                None => start(&decl, &mut slots, scope, deps)?,
            }
        };

        match started {
            Started::Ready(instance) => Ok(instance),
            Started::Pending(pending) => {
                if let Ok(handle) = tokio::runtime::Handle::try_current() {
                    handle.spawn(pending.map(drop));
                }
                Err(ResolutionError::AsyncInitializer {
                    target: target.to_string(),
                }
                .into())
            }
        }
    }

    /// Resolves `target` in `scope`, awaiting asynchronous initializers.
    ///
    /// Concurrent calls for the same `(target, scope)` share one
    /// initialization. Dependencies are resolved concurrently.
    pub fn resolve_async(&self, target: Target, scope: &Scope) -> BoxFuture<'static, CoreResult<Instance>> {
        let injector = self.clone();
        let scope = scope.clone();
        async move {
            let decl = injector.declaration(target)?;
            check_reentry(&decl, &scope)?;
            let in_flight = match decl.slots.lock().get(&scope) {
                Some(Slot::Ready(instance)) => return Ok(instance.clone()),
                Some(Slot::Pending(pending)) => Some(pending.clone()),
                None => None,
            };
            if let Some(pending) = in_flight {
                return pending.await;
            }

            let instances = try_join_all(decl.injects.iter().map(|dep| injector.resolve_async(*dep, &scope))).await?;
            let deps = Dependencies::new(target, decl.injects.clone(), instances);

            let started = {
                let mut slots = decl.slots.lock();
                match slots.get(&scope) {
                    Some(Slot::Ready(instance)) => return Ok(instance.clone()),
                    Some(Slot::Pending(pending)) => Started::Pending(pending.clone()),
                    None => start(&decl, &mut slots, &scope, deps)?,
                }
            };

            match started {
                Started::Ready(instance) => Ok(instance),
                Started::Pending(pending) => pending.await,
            }
        }
        .boxed()
    }

    /// Resolves every target in `scope` so later synchronous resolutions
    /// hit the cache.
    pub async fn preload(&self, targets: impl IntoIterator<Item = Target>, scope: &Scope) -> CoreResult<()> {
        let pending: Vec<_> = targets.into_iter().map(|target| self.resolve_async(target, scope)).collect();
        try_join_all(pending).await?;
        Ok(())
    }

    /// Typed form of [`resolve`](Self::resolve).
    pub fn get<T: Any + Send + Sync>(&self, scope: &Scope) -> CoreResult<Arc<T>> {
        let target = Target::of::<T>();
        downcast(target, self.resolve(target, scope)?)
    }

    /// Typed form of [`resolve_async`](Self::resolve_async).
    pub async fn get_async<T: Any + Send + Sync>(&self, scope: &Scope) -> CoreResult<Arc<T>> {
        let target = Target::of::<T>();
        downcast(target, self.resolve_async(target, scope).await?)
    }
}

/// Runs the factory of `decl` and records the outcome in `slots`.
///
/// Must be called with the slot lock held and the scope vacant.
fn start(
    decl: &Arc<InjectableDeclaration>,
    slots: &mut HashMap<Scope, Slot>,
    scope: &Scope,
    deps: Dependencies,
) -> CoreResult<Started> {
    let target = decl.target;
    let outcome = {
        let _running = ConstructGuard::enter(decl, scope);
        match &decl.factory {
            Factory::Construct(construct) => Initialization::Ready(construct(deps)),
            Factory::Initialize(initialize) => initialize(deps),
        }
    };

    match outcome {
        Initialization::Ready(result) => {
            let instance = result.map_err(|e| ResolutionError::initializer(target, e))?;
            slots.insert(scope.clone(), Slot::Ready(instance.clone()));
            debug!(injectable = %target, %scope, "Constructed injectable");
            Ok(Started::Ready(instance))
        }
        Initialization::Pending(future) => {
            let pending = settle_on_completion(Arc::downgrade(decl), target, scope.clone(), future);
            slots.insert(scope.clone(), Slot::Pending(pending.clone()));
            debug!(injectable = %target, %scope, "Started asynchronous initialization");
            Ok(Started::Pending(pending))
        }
    }
}

/// Wraps an initialization so that completing it settles the slot:
/// success caches the instance, failure frees the scope for a retry.
fn settle_on_completion(
    decl: Weak<InjectableDeclaration>,
    target: Target,
    scope: Scope,
    future: BoxFuture<'static, Result<Instance, BoxError>>,
) -> SharedInit {
    async move {
        let result = future
            .await
            .map_err(|e| Error::from(ResolutionError::initializer(target, e)));

        if let Some(decl) = decl.upgrade() {
            let mut slots = decl.slots.lock();
            match &result {
                Ok(instance) => {
                    slots.insert(scope.clone(), Slot::Ready(instance.clone()));
                }
                Err(_) => {
                    slots.remove(&scope);
                }
            }
        }

        match &result {
            Ok(_) => debug!(injectable = %target, %scope, "Asynchronous initialization completed"),
            Err(e) => warn!(injectable = %target, %scope, error = %e, "Asynchronous initialization failed"),
        }
        result
    }
    .boxed()
    .shared()
}
