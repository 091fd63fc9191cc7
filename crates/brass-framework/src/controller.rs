//! Controllers: injectables that group methods under a base path.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use brass_core::{
    BoxError, CoreResult, DeclarationError, Dependencies, Factory, Injector, MetadataKey, MethodTarget, Scope,
    Target,
};
use parking_lot::RwLock;
use tracing::debug;

use crate::handler::{Handler, MiddlewareHandler};
use crate::interceptor::InterceptorRef;
use crate::method::MethodRegistry;
use crate::middleware::MiddlewareRef;
use crate::router::{join_paths, wildcard_path};

/// Metadata key of controller declarations.
pub const CONTROLLER_KEY: MetadataKey = MetadataKey::new("brass.controller");

const KIND: &str = "controller";

/// Base path plus the interceptors and middleware shared by all methods.
pub struct ControllerDeclaration {
    path: String,
    interceptors: RwLock<Vec<InterceptorRef>>,
    middlewares: RwLock<Vec<MiddlewareRef>>,
}

impl ControllerDeclaration {
    fn new(path: String) -> Self {
        Self {
            path,
            interceptors: RwLock::new(Vec::new()),
            middlewares: RwLock::new(Vec::new()),
        }
    }

    /// The normalized base path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interceptors(&self) -> Vec<InterceptorRef> {
        self.interceptors.read().clone()
    }

    pub fn middlewares(&self) -> Vec<MiddlewareRef> {
        self.middlewares.read().clone()
    }
}

impl fmt::Debug for ControllerDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDeclaration")
            .field("path", &self.path)
            .field("interceptors", &*self.interceptors.read())
            .field("middlewares", &*self.middlewares.read())
            .finish()
    }
}

/// Declares controllers and turns them into route handlers.
#[derive(Clone)]
pub struct ControllerRegistry {
    injector: Injector,
    methods: MethodRegistry,
}

impl ControllerRegistry {
    pub fn new(injector: Injector, methods: MethodRegistry) -> Self {
        Self { injector, methods }
    }

    /// Declares `C` as a controller mounted at `path`, constructed from
    /// the injected dependencies.
    pub fn declare_controller<C, F>(
        &self,
        path: &str,
        injects: impl IntoIterator<Item = Target>,
        constructor: F,
    ) -> CoreResult<()>
    where
        C: Any + Send + Sync,
        F: Fn(Dependencies) -> Result<C, BoxError> + Send + Sync + 'static,
    {
        self.declare(Target::of::<C>(), path, injects, Factory::constructor(constructor))
    }

    /// Declares `target` as a controller and an injectable.
    ///
    /// Fails if `target` is already a controller or an injectable.
    pub fn declare(
        &self,
        target: Target,
        path: &str,
        injects: impl IntoIterator<Item = Target>,
        factory: Factory,
    ) -> CoreResult<()> {
        let metadata = self.injector.metadata();
        if metadata.contains(target, CONTROLLER_KEY, &Scope::DEFAULT) {
            return Err(DeclarationError::already_declared(target, KIND).into());
        }
        self.injector.declare(target, injects, factory)?;

        let path = join_paths(&[path]);
        debug!(controller = %target, path = %path, "Declared controller");
        metadata.set(target, CONTROLLER_KEY, ControllerDeclaration::new(path), &Scope::DEFAULT);
        Ok(())
    }

    /// Returns `true` if `target` was declared as a controller.
    pub fn is_declared(&self, target: Target) -> bool {
        self.injector
            .metadata()
            .contains(target, CONTROLLER_KEY, &Scope::DEFAULT)
    }

    pub fn declaration(&self, target: Target) -> CoreResult<Arc<ControllerDeclaration>> {
        self.injector
            .metadata()
            .get::<ControllerDeclaration>(target, CONTROLLER_KEY, &Scope::DEFAULT)
            .ok_or_else(|| DeclarationError::not_declared(target, KIND).into())
    }

    /// Replaces the interceptors applied to every method of the controller.
    pub fn declare_interceptors(
        &self,
        target: Target,
        interceptors: impl IntoIterator<Item = InterceptorRef>,
    ) -> CoreResult<()> {
        *self.declaration(target)?.interceptors.write() = interceptors.into_iter().collect();
        Ok(())
    }

    /// Replaces the middleware mounted below the controller path.
    pub fn declare_middlewares(
        &self,
        target: Target,
        middlewares: impl IntoIterator<Item = MiddlewareRef>,
    ) -> CoreResult<()> {
        *self.declaration(target)?.middlewares.write() = middlewares.into_iter().collect();
        Ok(())
    }

    /// Builds every handler of the controller.
    ///
    /// Controller middleware is mounted at `<path>/*` and comes first. Each
    /// method runs `external`, then the controller, then its own
    /// interceptors.
    pub fn get_handlers(&self, target: Target, external: &[InterceptorRef]) -> CoreResult<Vec<Handler>> {
        let declaration = self.declaration(target)?;
        let interceptors: Vec<_> = external
            .iter()
            .copied()
            .chain(declaration.interceptors())
            .collect();

        let mount = wildcard_path(&declaration.path);
        let mut handlers: Vec<_> = declaration
            .middlewares()
            .into_iter()
            .map(|middleware| {
                Handler::Middleware(MiddlewareHandler {
                    path: mount.clone(),
                    priority: 0,
                    middleware,
                })
            })
            .collect();

        for name in self.methods.methods_of(target) {
            let method = MethodTarget::new(target, name);
            handlers.extend(self.methods.get_handlers(method, &declaration.path, &interceptors)?);
        }
        Ok(handlers)
    }
}

impl fmt::Debug for ControllerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::execution::ExecutionContext;
    use crate::interceptor::{CallNext, Interceptor};
    use crate::method::MethodOptions;

    struct Users;
    struct Audit;

    #[async_trait]
    impl Interceptor for Audit {
        async fn intercept(&self, _ctx: Arc<ExecutionContext>, next: CallNext) -> Result<Value, BoxError> {
            next.run().await
        }
    }

    fn registry() -> ControllerRegistry {
        let injector = Injector::new();
        let methods = MethodRegistry::new(injector.metadata().clone());
        ControllerRegistry::new(injector, methods)
    }

    #[test]
    fn test_declare_twice_fails() {
        let controllers = registry();
        controllers
            .declare_controller::<Users, _>("/users/", [], |_| Ok(Users))
            .unwrap();
        assert_eq!(controllers.declaration(Target::of::<Users>()).unwrap().path(), "/users");

        let err = controllers
            .declare_controller::<Users, _>("/people", [], |_| Ok(Users))
            .unwrap_err();
        assert!(err.is_declaration());
    }

    #[test]
    fn test_existing_injectable_cannot_become_controller() {
        let controllers = registry();
        controllers
            .injector
            .declare_constructor::<Users, _>([], |_| Ok(Users))
            .unwrap();

        assert!(controllers
            .declare_controller::<Users, _>("/users", [], |_| Ok(Users))
            .is_err());
        assert!(!controllers.is_declared(Target::of::<Users>()));
    }

    #[test]
    fn test_undeclared_controller_has_no_handlers() {
        let controllers = registry();
        assert!(controllers.get_handlers(Target::of::<Users>(), &[]).is_err());
        assert!(controllers
            .declare_interceptors(Target::of::<Users>(), [InterceptorRef::of::<Audit>()])
            .is_err());
    }

    #[test]
    fn test_handlers_carry_controller_path_and_interceptors() {
        let controllers = registry();
        let target = Target::of::<Users>();
        controllers
            .declare_controller::<Users, _>("/users", [], |_| Ok(Users))
            .unwrap();
        controllers
            .declare_interceptors(target, [InterceptorRef::of::<Audit>()])
            .unwrap();
        controllers
            .methods
            .bind::<Users, _, _, _>("list", MethodOptions::get("/"), |_, _| async { Ok::<_, BoxError>(1) })
            .unwrap();
        controllers
            .methods
            .bind::<Users, _, _, _>("show", MethodOptions::get("/:id"), |_, _| async { Ok::<_, BoxError>(2) })
            .unwrap();

        let handlers = controllers.get_handlers(target, &[]).unwrap();
        let paths: Vec<_> = handlers.iter().map(Handler::path).collect();
        assert_eq!(paths, vec!["/users", "/users/:id"]);
        match &handlers[0] {
            Handler::Method(handler) => assert_eq!(handler.interceptors, vec![InterceptorRef::of::<Audit>()]),
            Handler::Middleware(_) => panic!("expected a method handler"),
        }
    }
}
