use std::collections::HashMap;
use std::fmt;

use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use super::{Factory, Instance};
use crate::error::CoreResult;
use crate::scope::Scope;
use crate::target::Target;

/// An initialization in flight, awaited by every concurrent resolver.
pub(crate) type SharedInit = Shared<BoxFuture<'static, CoreResult<Instance>>>;

/// State of one `(target, scope)` pair. A scope is either settled or in
/// flight, never both.
pub(crate) enum Slot {
    Ready(Instance),
    Pending(SharedInit),
}

/// How a target is constructed, plus its per-scope instance cache.
pub struct InjectableDeclaration {
    pub(crate) target: Target,
    pub(crate) injects: Vec<Target>,
    pub(crate) factory: Factory,
    pub(crate) slots: Mutex<HashMap<Scope, Slot>>,
}

impl InjectableDeclaration {
    pub(crate) fn new(target: Target, injects: Vec<Target>, factory: Factory) -> Self {
        Self {
            target,
            injects,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// The declared target.
    pub fn target(&self) -> Target {
        self.target
    }

    /// The dependencies, in the order they are handed to the factory.
    pub fn injects(&self) -> &[Target] {
        &self.injects
    }

    /// The factory.
    pub fn factory(&self) -> &Factory {
        &self.factory
    }

    /// Returns the cached instance for `scope`, if construction finished.
    pub fn instance(&self, scope: &Scope) -> Option<Instance> {
        match self.slots.lock().get(scope) {
            Some(Slot::Ready(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Returns `true` while an initialization for `scope` is in flight.
    pub fn is_pending(&self, scope: &Scope) -> bool {
        matches!(self.slots.lock().get(scope), Some(Slot::Pending(_)))
    }
}

impl fmt::Debug for InjectableDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectableDeclaration")
            .field("target", &self.target)
            .field("injects", &self.injects)
            .field("factory", &self.factory)
            .field("scopes", &self.slots.lock().len())
            .finish()
    }
}
