//! Controller methods exposed as routes.
//!
//! Declarations merge: the first one starts from the defaults (`GET /`,
//! priority 0, nothing else) and every later one overwrites only the fields
//! it sets. Lists are replaced, not appended, so set all interceptors (or
//! middleware) of a method in one call.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use brass_core::{
    BoxError, CoreResult, DeclarationError, Instance, MetadataKey, MetadataStore, MethodTarget, ResolutionError,
    Scope, Target,
};
use futures::FutureExt;
use futures::future::ready;
use http::Method;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::debug;

use crate::handler::{Handler, MethodFn, MethodHandler, MiddlewareHandler};
use crate::http::HttpVerb;
use crate::interceptor::InterceptorRef;
use crate::middleware::MiddlewareRef;
use crate::param::{ParamResolver, Params};
use crate::router::join_paths;

/// Metadata key of method declarations.
pub const METHOD_KEY: MetadataKey = MetadataKey::new("brass.method");

/// Metadata key of the ordered method list of a controller.
pub const METHOD_LIST_KEY: MetadataKey = MetadataKey::new("brass.method.list");

type MethodList = RwLock<Vec<&'static str>>;

/// Everything declared about one controller method.
#[derive(Clone)]
pub struct MethodDeclaration {
    pub verb: HttpVerb,
    pub path: String,
    pub priority: i32,
    pub params: Vec<ParamResolver>,
    pub interceptors: Vec<InterceptorRef>,
    pub middlewares: Vec<MiddlewareRef>,
    /// The bound method; routes can only be built once it is set.
    pub invoke: Option<MethodFn>,
}

impl Default for MethodDeclaration {
    fn default() -> Self {
        Self {
            verb: HttpVerb::default(),
            path: "/".to_string(),
            priority: 0,
            params: Vec::new(),
            interceptors: Vec::new(),
            middlewares: Vec::new(),
            invoke: None,
        }
    }
}

impl fmt::Debug for MethodDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDeclaration")
            .field("verb", &self.verb)
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("params", &self.params.len())
            .field("interceptors", &self.interceptors)
            .field("middlewares", &self.middlewares)
            .field("bound", &self.invoke.is_some())
            .finish()
    }
}

// =============================================================================
// MethodOptions
// =============================================================================

/// A partial [`MethodDeclaration`]; unset fields keep their current value.
#[derive(Clone, Default)]
pub struct MethodOptions {
    verb: Option<HttpVerb>,
    path: Option<String>,
    priority: Option<i32>,
    params: Option<Vec<ParamResolver>>,
    interceptors: Option<Vec<InterceptorRef>>,
    middlewares: Option<Vec<MiddlewareRef>>,
}

impl MethodOptions {
    /// Options that change nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A route for `verb` at `path`.
    pub fn route(verb: impl Into<HttpVerb>, path: impl Into<String>) -> Self {
        Self::new().verb(verb).path(path)
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::route(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::route(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::route(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::route(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::route(Method::DELETE, path)
    }

    /// A route answering every method.
    pub fn all(path: impl Into<String>) -> Self {
        Self::route(HttpVerb::All, path)
    }

    pub fn verb(mut self, verb: impl Into<HttpVerb>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// The parameter resolvers, in argument order.
    pub fn params(mut self, params: impl IntoIterator<Item = ParamResolver>) -> Self {
        self.params = Some(params.into_iter().collect());
        self
    }

    pub fn interceptors(mut self, interceptors: impl IntoIterator<Item = InterceptorRef>) -> Self {
        self.interceptors = Some(interceptors.into_iter().collect());
        self
    }

    pub fn middlewares(mut self, middlewares: impl IntoIterator<Item = MiddlewareRef>) -> Self {
        self.middlewares = Some(middlewares.into_iter().collect());
        self
    }

    fn apply(self, declaration: &mut MethodDeclaration) {
        if let Some(verb) = self.verb {
            declaration.verb = verb;
        }
        if let Some(path) = self.path {
            declaration.path = path;
        }
        if let Some(priority) = self.priority {
            declaration.priority = priority;
        }
        if let Some(params) = self.params {
            declaration.params = params;
        }
        if let Some(interceptors) = self.interceptors {
            declaration.interceptors = interceptors;
        }
        if let Some(middlewares) = self.middlewares {
            declaration.middlewares = middlewares;
        }
    }
}

impl<V: Into<HttpVerb>> From<(V, &str)> for MethodOptions {
    fn from((verb, path): (V, &str)) -> Self {
        Self::route(verb, path)
    }
}

// =============================================================================
// MethodRegistry
// =============================================================================

/// Declares controller methods in the shared [`MetadataStore`].
#[derive(Clone, Default)]
pub struct MethodRegistry {
    metadata: Arc<MetadataStore>,
}

impl MethodRegistry {
    pub fn new(metadata: Arc<MetadataStore>) -> Self {
        Self { metadata }
    }

    fn entry(&self, target: MethodTarget) -> CoreResult<Arc<RwLock<MethodDeclaration>>> {
        let mut created = false;
        let entry = self
            .metadata
            .get_or_init(
                target,
                METHOD_KEY,
                || {
                    created = true;
                    RwLock::new(MethodDeclaration::default())
                },
                &Scope::DEFAULT,
            )
            .ok_or_else(|| DeclarationError::invalid(target, "conflicting method metadata"))?;

        if created {
            let methods = self
                .metadata
                .get_or_init(target.owner(), METHOD_LIST_KEY, MethodList::default, &Scope::DEFAULT)
                .ok_or_else(|| DeclarationError::invalid(target.owner(), "conflicting method list"))?;
            methods.write().push(target.name());
        }
        Ok(entry)
    }

    /// Declares a method or merges `options` into its declaration.
    pub fn declare_method(&self, target: MethodTarget, options: MethodOptions) -> CoreResult<()> {
        let entry = self.entry(target)?;
        options.apply(&mut entry.write());
        debug!(method = %target, "Declared method");
        Ok(())
    }

    /// Declares the method `name` of controller `C`, bound to `f`.
    ///
    /// `f` receives the resolved controller and the resolved parameters;
    /// its result is encoded as JSON.
    ///
    /// ```rust,ignore
    /// methods.bind::<UserController, _, _, _>(
    ///     "show",
    ///     MethodOptions::get("/:id").params([param("id")]),
    ///     |this, params| async move { this.show(&params.take::<String>(0)?).await },
    /// )?;
    /// ```
    pub fn bind<C, F, Fut, R>(&self, name: &'static str, options: MethodOptions, f: F) -> CoreResult<MethodTarget>
    where
        C: Any + Send + Sync,
        F: Fn(Arc<C>, Params) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let target = MethodTarget::of::<C>(name);
        let invoke: MethodFn = Arc::new(move |instance: Instance, params: Params| match instance.downcast::<C>() {
            Ok(controller) => f(controller, params)
                .map(|result| result.and_then(|value| serde_json::to_value(value).map_err(Into::into)))
                .boxed(),
            Err(_) => {
                let mismatch = ResolutionError::TypeMismatch {
                    target: target.owner().to_string(),
                    expected: std::any::type_name::<C>(),
                };
                ready(Err(mismatch.into())).boxed()
            }
        });

        self.declare_method(target, options)?;
        self.entry(target)?.write().invoke = Some(invoke);
        Ok(target)
    }

    /// Returns `true` if the method was declared.
    pub fn is_declared(&self, target: MethodTarget) -> bool {
        self.metadata.contains(target, METHOD_KEY, &Scope::DEFAULT)
    }

    /// A snapshot of the declaration.
    pub fn declaration(&self, target: MethodTarget) -> Option<MethodDeclaration> {
        self.metadata
            .get::<RwLock<MethodDeclaration>>(target, METHOD_KEY, &Scope::DEFAULT)
            .map(|entry| entry.read().clone())
    }

    /// Names of the declared methods of `controller`, in declaration order.
    pub fn methods_of(&self, controller: Target) -> Vec<&'static str> {
        self.metadata
            .get::<MethodList>(controller, METHOD_LIST_KEY, &Scope::DEFAULT)
            .map(|methods| methods.read().clone())
            .unwrap_or_default()
    }

    /// Replaces the interceptors of a method.
    pub fn declare_interceptors(
        &self,
        target: MethodTarget,
        interceptors: impl IntoIterator<Item = InterceptorRef>,
    ) -> CoreResult<()> {
        self.declare_method(target, MethodOptions::new().interceptors(interceptors))
    }

    /// Replaces the middleware of a method.
    pub fn declare_middlewares(
        &self,
        target: MethodTarget,
        middlewares: impl IntoIterator<Item = MiddlewareRef>,
    ) -> CoreResult<()> {
        self.declare_method(target, MethodOptions::new().middlewares(middlewares))
    }

    /// Builds the route of a method plus one middleware route per method
    /// middleware, all at `base_path` joined with the method path.
    ///
    /// `external` interceptors run before the method's own.
    pub fn get_handlers(
        &self,
        target: MethodTarget,
        base_path: &str,
        external: &[InterceptorRef],
    ) -> CoreResult<Vec<Handler>> {
        let declaration = self
            .declaration(target)
            .ok_or_else(|| DeclarationError::not_declared(target, "method"))?;
        let invoke = declaration
            .invoke
            .clone()
            .ok_or_else(|| DeclarationError::invalid(target, "no function is bound to the method"))?;

        let path = join_paths(&[base_path, declaration.path.as_str()]);
        let interceptors = external
            .iter()
            .chain(declaration.interceptors.iter())
            .copied()
            .collect();

        let mut handlers = Vec::with_capacity(1 + declaration.middlewares.len());
        handlers.push(Handler::Method(MethodHandler {
            verb: declaration.verb,
            path: path.clone(),
            priority: declaration.priority,
            target,
            controller: target.owner(),
            interceptors,
            params: declaration.params,
            invoke,
        }));
        handlers.extend(declaration.middlewares.into_iter().map(|middleware| {
            Handler::Middleware(MiddlewareHandler {
                path: path.clone(),
                priority: 0,
                middleware,
            })
        }));
        Ok(handlers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Users;

    #[test]
    fn test_merge_on_redeclare() {
        let methods = MethodRegistry::default();
        let target = MethodTarget::of::<Users>("show");

        methods
            .declare_method(target, MethodOptions::new().priority(3))
            .unwrap();
        let declaration = methods.declaration(target).unwrap();
        assert_eq!(declaration.verb, HttpVerb::default());
        assert_eq!(declaration.path, "/");
        assert_eq!(declaration.priority, 3);

        methods
            .declare_method(target, MethodOptions::post("/:id"))
            .unwrap();
        let declaration = methods.declaration(target).unwrap();
        assert_eq!(declaration.verb, HttpVerb::Exact(Method::POST));
        assert_eq!(declaration.path, "/:id");
        assert_eq!(declaration.priority, 3);
    }

    #[test]
    fn test_method_list_keeps_declaration_order() {
        let methods = MethodRegistry::default();
        for name in ["list", "show", "list", "create"] {
            methods
                .declare_method(MethodTarget::of::<Users>(name), MethodOptions::new())
                .unwrap();
        }

        assert_eq!(methods.methods_of(Target::of::<Users>()), vec!["list", "show", "create"]);
    }

    #[test]
    fn test_unbound_method_has_no_handlers() {
        let methods = MethodRegistry::default();
        let target = MethodTarget::of::<Users>("list");
        methods.declare_method(target, MethodOptions::get("/")).unwrap();

        let err = methods.get_handlers(target, "/users", &[]).unwrap_err();
        assert!(err.is_declaration());
    }

    #[test]
    fn test_handlers_join_paths() {
        let methods = MethodRegistry::default();
        let target = methods
            .bind::<Users, _, _, _>("show", MethodOptions::get("/:id/"), |_, _| async {
                Ok::<_, BoxError>("ok")
            })
            .unwrap();

        let handlers = methods.get_handlers(target, "users/", &[]).unwrap();
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].path(), "/users/:id");
    }
}
