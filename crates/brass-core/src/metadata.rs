//! Side table attaching metadata to targets.
//!
//! Every registry of the framework (injectables, controllers, methods,
//! tags) stores its declarations here under its own [`MetadataKey`], so
//! several of them can describe the same target without colliding. The
//! target itself never needs to cooperate.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::scope::Scope;
use crate::target::MetadataTarget;

/// Name of one logical registry inside the [`MetadataStore`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetadataKey(&'static str);

impl MetadataKey {
    /// Creates a key. Keys are compared by name.
    pub const fn new(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the key name.
    pub fn name(&self) -> &'static str {
        self.0
    }
}

impl fmt::Debug for MetadataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetadataKey({})", self.0)
    }
}

type Value = Arc<dyn Any + Send + Sync>;
type Slot = (MetadataTarget, Scope, MetadataKey);

/// Thread-safe map from `(target, scope, key)` to an arbitrary value.
///
/// Values are never removed. Readers get an `Arc` to the stored value, so
/// values that change after insertion carry their own interior mutability.
#[derive(Default)]
pub struct MetadataStore {
    records: RwLock<HashMap<Slot, Value>>,
}

impl MetadataStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, or `None` if absent or of a
    /// different type.
    pub fn get<V>(&self, target: impl Into<MetadataTarget>, key: MetadataKey, scope: &Scope) -> Option<Arc<V>>
    where
        V: Any + Send + Sync,
    {
        let slot = (target.into(), scope.clone(), key);
        let value = self.records.read().get(&slot).cloned()?;
        value.downcast::<V>().ok()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<V>(&self, target: impl Into<MetadataTarget>, key: MetadataKey, value: V, scope: &Scope)
    where
        V: Any + Send + Sync,
    {
        let slot = (target.into(), scope.clone(), key);
        self.records.write().insert(slot, Arc::new(value));
    }

    /// Returns the value stored under `key`, storing `init()` first if the
    /// key is vacant. An existing value is never overwritten.
    ///
    /// Returns `None` only if the existing value has a different type.
    pub fn get_or_init<V>(
        &self,
        target: impl Into<MetadataTarget>,
        key: MetadataKey,
        init: impl FnOnce() -> V,
        scope: &Scope,
    ) -> Option<Arc<V>>
    where
        V: Any + Send + Sync,
    {
        let slot = (target.into(), scope.clone(), key);
        let value = self
            .records
            .write()
            .entry(slot)
            .or_insert_with(|| Arc::new(init()))
            .clone();
        value.downcast::<V>().ok()
    }

    /// Returns `true` if anything is stored under `key`.
    pub fn contains(&self, target: impl Into<MetadataTarget>, key: MetadataKey, scope: &Scope) -> bool {
        let slot = (target.into(), scope.clone(), key);
        self.records.read().contains_key(&slot)
    }
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore")
            .field("records", &self.records.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{MethodTarget, Target};

    const COLOR: MetadataKey = MetadataKey::new("test.color");
    const SIZE: MetadataKey = MetadataKey::new("test.size");

    struct Widget;

    #[test]
    fn test_keys_do_not_collide() {
        let store = MetadataStore::new();
        let target = Target::of::<Widget>();
        store.set(target, COLOR, "red".to_string(), &Scope::DEFAULT);
        store.set(target, SIZE, 3usize, &Scope::DEFAULT);

        assert_eq!(
            store.get::<String>(target, COLOR, &Scope::DEFAULT).as_deref(),
            Some(&"red".to_string())
        );
        assert_eq!(store.get::<usize>(target, SIZE, &Scope::DEFAULT).as_deref(), Some(&3));
        assert!(store.get::<usize>(target, COLOR, &Scope::DEFAULT).is_none());
    }

    #[test]
    fn test_scopes_and_methods_are_separate() {
        let store = MetadataStore::new();
        let target = Target::of::<Widget>();
        let method = MethodTarget::of::<Widget>("paint");
        store.set(target, COLOR, 1u8, &Scope::DEFAULT);

        assert!(!store.contains(target, COLOR, &Scope::named("other")));
        assert!(!store.contains(method, COLOR, &Scope::DEFAULT));
        assert!(store.contains(target, COLOR, &Scope::DEFAULT));
    }

    #[test]
    fn test_get_or_init_never_overwrites() {
        let store = MetadataStore::new();
        let target = Target::of::<Widget>();

        let first = store.get_or_init(target, SIZE, || 1u32, &Scope::DEFAULT);
        let second = store.get_or_init(target, SIZE, || 2u32, &Scope::DEFAULT);

        assert_eq!(first.as_deref(), Some(&1));
        assert_eq!(second.as_deref(), Some(&1));
    }
}
