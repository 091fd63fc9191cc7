//! Free-form tags on controllers and methods.
//!
//! Tags let middleware make decisions based on the route that will handle
//! the request, e.g. an auth middleware checking a `requires_auth` tag
//! through [`ExecutionContext::tag`](crate::execution::ExecutionContext::tag).

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use brass_core::{Instance, MetadataKey, MetadataStore, MetadataTarget, MethodTarget, Scope, Target};
use parking_lot::RwLock;

/// Metadata key of tag maps.
pub const TAG_KEY: MetadataKey = MetadataKey::new("brass.tag");

type Tags = RwLock<HashMap<String, Instance>>;

/// Where [`ExecutionContext::tag`](crate::execution::ExecutionContext::tag) looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    /// Only the method.
    Method,
    /// Only the controller.
    Controller,
    /// The method, then the controller.
    #[default]
    MethodFirst,
    /// The controller, then the method.
    ControllerFirst,
}

/// Reads and writes tags in the shared [`MetadataStore`].
#[derive(Clone, Default)]
pub struct TagRegistry {
    metadata: Arc<MetadataStore>,
}

impl TagRegistry {
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self { metadata }
    }

    fn tags(&self, target: impl Into<MetadataTarget>) -> Option<Arc<Tags>> {
        self.metadata.get_or_init(target, TAG_KEY, Tags::default, &Scope::DEFAULT)
    }

    fn existing(&self, target: impl Into<MetadataTarget>) -> Option<Arc<Tags>> {
        self.metadata.get::<Tags>(target, TAG_KEY, &Scope::DEFAULT)
    }

    /// Sets a tag, replacing a previous value.
    pub fn set<V: Any + Send + Sync>(&self, target: impl Into<MetadataTarget>, name: impl Into<String>, value: V) {
        if let Some(tags) = self.tags(target) {
            tags.write().insert(name.into(), Arc::new(value));
        }
    }

    /// Reads a tag, if present and a `V`.
    pub fn get<V: Any + Send + Sync>(&self, target: impl Into<MetadataTarget>, name: &str) -> Option<Arc<V>> {
        let value = self.existing(target)?.read().get(name).cloned()?;
        value.downcast::<V>().ok()
    }

    pub fn has(&self, target: impl Into<MetadataTarget>, name: &str) -> bool {
        self.existing(target)
            .is_some_and(|tags| tags.read().contains_key(name))
    }

    /// Removes a tag. Returns `true` if it existed.
    pub fn delete(&self, target: impl Into<MetadataTarget>, name: &str) -> bool {
        self.existing(target)
            .is_some_and(|tags| tags.write().remove(name).is_some())
    }

    pub fn clear(&self, target: impl Into<MetadataTarget>) {
        if let Some(tags) = self.existing(target) {
            tags.write().clear();
        }
    }

    /// All tags of the target, sorted by name.
    pub fn entries(&self, target: impl Into<MetadataTarget>) -> Vec<(String, Instance)> {
        let mut entries: Vec<_> = self
            .existing(target)
            .map(|tags| {
                tags.read()
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    /// Looks a tag up on a method and its controller according to `mode`.
    pub fn lookup<V: Any + Send + Sync>(
        &self,
        name: &str,
        mode: TagMode,
        method: Option<MethodTarget>,
        controller: Option<Target>,
    ) -> Option<Arc<V>> {
        let on_method = || method.and_then(|m| self.get::<V>(m, name));
        let on_controller = || controller.and_then(|c| self.get::<V>(c, name));

        match mode {
            TagMode::Method => on_method(),
            TagMode::Controller => on_controller(),
            TagMode::MethodFirst => on_method().or_else(on_controller),
            TagMode::ControllerFirst => on_controller().or_else(on_method),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Users;

    #[test]
    fn test_tag_lifecycle() {
        let tags = TagRegistry::default();
        let target = Target::of::<Users>();

        tags.set(target, "role", "admin".to_string());
        tags.set(target, "limit", 10u32);
        assert!(tags.has(target, "role"));
        assert_eq!(tags.get::<u32>(target, "limit").as_deref(), Some(&10));
        assert!(tags.get::<u32>(target, "role").is_none());
        assert_eq!(tags.entries(target)[0].0, "limit");

        assert!(tags.delete(target, "role"));
        assert!(!tags.delete(target, "role"));
        tags.clear(target);
        assert!(tags.entries(target).is_empty());
    }

    #[test]
    fn test_lookup_modes() {
        let tags = TagRegistry::default();
        let controller = Target::of::<Users>();
        let method = MethodTarget::of::<Users>("list");
        tags.set(controller, "auth", false);
        tags.set(method, "auth", true);
        tags.set(controller, "only_controller", 1u8);

        let lookup = |mode| tags.lookup::<bool>("auth", mode, Some(method), Some(controller)).map(|v| *v);
        assert_eq!(lookup(TagMode::MethodFirst), Some(true));
        assert_eq!(lookup(TagMode::ControllerFirst), Some(false));
        assert_eq!(lookup(TagMode::Controller), Some(false));
        assert_eq!(
            tags.lookup::<u8>("only_controller", TagMode::MethodFirst, Some(method), Some(controller))
                .as_deref(),
            Some(&1)
        );
        assert!(tags.lookup::<u8>("only_controller", TagMode::Method, Some(method), None).is_none());
    }
}
