//! The composition root.
//!
//! An [`Application`] owns the router and the execution engine. Controllers
//! and middleware are registered once, before serving; every request then
//! goes through [`Application::fetch`] (or the [`tower::Service`] impl).

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};

use brass_core::{CoreResult, DeclarationError, Instance, Scope, Target};
use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared, try_join_all};
use parking_lot::{Mutex, RwLock};
use tower::Service;
use tracing::{debug, info, warn};

use crate::execution::{Engine, ExecutionOptions};
use crate::fallback::{DefaultHandler, ErrorRef, NotFoundRef};
use crate::handler::{Handler, MiddlewareHandler};
use crate::interceptor::InterceptorRef;
use crate::middleware::MiddlewareRef;
use crate::registry::Registry;
use crate::router::{Router, join_paths};

type Preload = Shared<BoxFuture<'static, CoreResult<()>>>;

/// Settings of an [`Application`].
#[derive(Debug, Clone, Default)]
pub struct ApplicationOptions {
    /// Scope every request resolves its injectables in.
    pub scope: Scope,
    /// Preload `controllers` (and their dependencies) on startup.
    pub preload: bool,
    /// Interceptors wrapping every method, outermost first.
    pub interceptors: Vec<InterceptorRef>,
    /// Middleware mounted at `/*`.
    pub middlewares: Vec<MiddlewareRef>,
    /// Defaults to [`DefaultHandler`].
    pub not_found: Option<NotFoundRef>,
    /// Defaults to [`DefaultHandler`].
    pub error_handler: Option<ErrorRef>,
    pub controllers: Vec<Target>,
}

impl ApplicationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn preload(mut self, preload: bool) -> Self {
        self.preload = preload;
        self
    }

    pub fn interceptor(mut self, interceptor: InterceptorRef) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn middleware(mut self, middleware: MiddlewareRef) -> Self {
        self.middlewares.push(middleware);
        self
    }

    pub fn not_found(mut self, handler: NotFoundRef) -> Self {
        self.not_found = Some(handler);
        self
    }

    pub fn error_handler(mut self, handler: ErrorRef) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn controller(mut self, controller: Target) -> Self {
        self.controllers.push(controller);
        self
    }

    pub fn controllers(mut self, controllers: impl IntoIterator<Item = Target>) -> Self {
        self.controllers.extend(controllers);
        self
    }
}

struct Inner {
    registry: Registry,
    engine: Engine,
    scope: Scope,
    interceptors: Vec<InterceptorRef>,
    router: RwLock<Router>,
    preloads: Mutex<Vec<Preload>>,
}

/// A routable application. Cheap to clone.
#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

impl Application {
    /// Creates the application and registers the controllers and
    /// middleware of `options`.
    ///
    /// Fails if one of them is not declared.
    pub fn new(registry: Registry, options: ApplicationOptions) -> CoreResult<Self> {
        let injector = registry.injector().clone();
        if (options.not_found.is_none() || options.error_handler.is_none())
            && !injector.is_declared(Target::of::<DefaultHandler>())
        {
            injector.provide(DefaultHandler)?;
        }

        let not_found = options.not_found.unwrap_or_else(NotFoundRef::of::<DefaultHandler>);
        let error_handler = options
            .error_handler
            .unwrap_or_else(ErrorRef::of::<DefaultHandler>);
        let engine = Engine::new(injector, registry.tags().clone(), not_found, error_handler);

        info!("Starting application");
        debug!(scope = %options.scope, preload = options.preload, "Application options");

        let app = Self {
            inner: Arc::new(Inner {
                registry,
                engine,
                scope: options.scope,
                interceptors: options.interceptors,
                router: RwLock::new(Router::new()),
                preloads: Mutex::new(Vec::new()),
            }),
        };

        if options.preload && !options.controllers.is_empty() {
            info!(count = options.controllers.len(), "Preloading controllers");
            app.start_preload(options.controllers.clone());
        }
        for controller in options.controllers {
            app.register_controller(controller, false)?;
        }
        for middleware in options.middlewares {
            app.register_middleware(middleware, "*", 0, false)?;
        }

        Ok(app)
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn scope(&self) -> &Scope {
        &self.inner.scope
    }

    /// Adds the routes of a declared controller.
    ///
    /// With `preload`, the controller and its dependencies are constructed
    /// in the background; [`ready`](Self::ready) waits for it.
    pub fn register_controller(&self, controller: Target, preload: bool) -> CoreResult<()> {
        info!(controller = %controller, "Registering controller");
        let registry = &self.inner.registry;
        if !registry.controllers().is_declared(controller) {
            return Err(DeclarationError::not_declared(controller, "controller").into());
        }

        let handlers = registry
            .controllers()
            .get_handlers(controller, &self.inner.interceptors)?;
        {
            let mut router = self.inner.router.write();
            for handler in handlers {
                router.add(handler)?;
            }
        }

        if preload {
            self.start_preload(vec![controller]);
        }
        Ok(())
    }

    /// Mounts a declared middleware at `path`. Higher `priority` runs first.
    pub fn register_middleware(
        &self,
        middleware: MiddlewareRef,
        path: &str,
        priority: i32,
        preload: bool,
    ) -> CoreResult<()> {
        let path = join_paths(&[path]);
        info!(middleware = %middleware.target(), path = %path, priority, "Registering middleware");
        if !self.inner.registry.injector().is_declared(middleware.target()) {
            return Err(DeclarationError::not_declared(middleware.target(), "injectable").into());
        }

        self.inner.router.write().add(Handler::Middleware(MiddlewareHandler {
            path,
            priority,
            middleware,
        }))?;

        if preload {
            self.start_preload(vec![middleware.target()]);
        }
        Ok(())
    }

    fn start_preload(&self, targets: Vec<Target>) {
        let injector = self.inner.registry.injector().clone();
        let scope = self.inner.scope.clone();
        let preload = async move { injector.preload(targets, &scope).await }
            .boxed()
            .shared();

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(preload.clone().map(|result| {
                    if let Err(err) = result {
                        warn!(error = %err, "Preloading failed");
                    }
                }));
            }
            Err(_) => debug!("No runtime, preloading waits for Application::ready"),
        }
        self.inner.preloads.lock().push(preload);
    }

    /// Resolves once every preload started so far has finished.
    pub async fn ready(&self) -> CoreResult<()> {
        let preloads = self.inner.preloads.lock().clone();
        try_join_all(preloads).await?;
        Ok(())
    }

    /// Handles one request. `env` is exposed to handlers through
    /// [`ExecutionContext::env`](crate::execution::ExecutionContext::env).
    pub async fn fetch(&self, request: http::Request<Bytes>, env: Option<Instance>) -> http::Response<Bytes> {
        let matches = self
            .inner
            .router
            .read()
            .match_route(request.method(), request.uri().path());

        self.inner
            .engine
            .execute(ExecutionOptions {
                request,
                matches,
                scope: self.inner.scope.clone(),
                env,
            })
            .await
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("scope", &self.inner.scope)
            .field("router", &*self.inner.router.read())
            .finish_non_exhaustive()
    }
}

impl Service<http::Request<Bytes>> for Application {
    type Response = http::Response<Bytes>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: http::Request<Bytes>) -> Self::Future {
        let app = self.clone();
        Box::pin(async move { Ok(app.fetch(request, None).await) })
    }
}
