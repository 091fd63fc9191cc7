use std::sync::Arc;

use brass_core::{CoreResult, Injector, MetadataStore, MetadataTarget};

use crate::controller::ControllerRegistry;
use crate::interceptor::InterceptorRef;
use crate::method::MethodRegistry;
use crate::middleware::MiddlewareRef;
use crate::tag::TagRegistry;

/// All registries of an application, backed by one [`MetadataStore`].
#[derive(Clone)]
pub struct Registry {
    injector: Injector,
    controllers: ControllerRegistry,
    methods: MethodRegistry,
    tags: TagRegistry,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self::with_metadata(Arc::new(MetadataStore::new()))
    }

    pub fn with_metadata(metadata: Arc<MetadataStore>) -> Self {
        let injector = Injector::with_metadata(metadata.clone());
        let methods = MethodRegistry::new(metadata.clone());
        Self {
            controllers: ControllerRegistry::new(injector.clone(), methods.clone()),
            tags: TagRegistry::new(metadata),
            injector,
            methods,
        }
    }

    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    pub fn controllers(&self) -> &ControllerRegistry {
        &self.controllers
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn tags(&self) -> &TagRegistry {
        &self.tags
    }

    /// Replaces the interceptors of a controller or a method.
    pub fn declare_interceptors(
        &self,
        target: impl Into<MetadataTarget>,
        interceptors: impl IntoIterator<Item = InterceptorRef>,
    ) -> CoreResult<()> {
        match target.into() {
            MetadataTarget::Type(target) => self.controllers.declare_interceptors(target, interceptors),
            MetadataTarget::Method(target) => self.methods.declare_interceptors(target, interceptors),
        }
    }

    /// Replaces the middleware of a controller or a method.
    pub fn declare_middlewares(
        &self,
        target: impl Into<MetadataTarget>,
        middlewares: impl IntoIterator<Item = MiddlewareRef>,
    ) -> CoreResult<()> {
        match target.into() {
            MetadataTarget::Type(target) => self.controllers.declare_middlewares(target, middlewares),
            MetadataTarget::Method(target) => self.methods.declare_middlewares(target, middlewares),
        }
    }
}
