use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use brass_core::{BoxError, Injector, Instance, MetadataStore, MethodTarget, Scope, Target};
use bytes::Bytes;
use http::{Method, Request, StatusCode};
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::*;
use crate::fallback::{DefaultHandler, ErrorHandler, error_fn, not_found_fn};
use crate::handler::{Handler, MiddlewareHandler};
use crate::interceptor::{Interceptor, InterceptorRef, interceptor_fn};
use crate::middleware::{Middleware, MiddlewareRef, middleware_fn};
use crate::param::{ParamResolver, context, param, resolver};
use crate::router::Router;
use crate::tag::TagMode;

struct Greeter;

/// Engine plus router over one shared store.
struct Harness {
    injector: Injector,
    tags: TagRegistry,
    router: Router,
    not_found: NotFoundRef,
    error_handler: ErrorRef,
}

impl Harness {
    fn new() -> Self {
        let metadata = Arc::new(MetadataStore::new());
        let injector = Injector::with_metadata(metadata.clone());
        injector.provide(DefaultHandler).unwrap();
        injector.declare_constructor::<Greeter, _>([], |_| Ok(Greeter)).unwrap();
        Self {
            injector,
            tags: TagRegistry::new(metadata),
            router: Router::new(),
            not_found: NotFoundRef::of::<DefaultHandler>(),
            error_handler: ErrorRef::of::<DefaultHandler>(),
        }
    }

    fn engine(&self) -> Engine {
        Engine::new(
            self.injector.clone(),
            self.tags.clone(),
            self.not_found,
            self.error_handler,
        )
    }

    fn method(
        &mut self,
        path: &str,
        interceptors: Vec<InterceptorRef>,
        params: Vec<ParamResolver>,
        calls: Arc<AtomicUsize>,
    ) {
        self.router
            .add(Handler::Method(MethodHandler {
                verb: Method::GET.into(),
                path: path.to_string(),
                priority: 0,
                target: MethodTarget::of::<Greeter>("greet"),
                controller: Target::of::<Greeter>(),
                interceptors,
                params,
                invoke: Arc::new(move |_: Instance, params: Params| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let name = params.take::<String>(0).unwrap_or_else(|_| "world".to_string());
                    async move { Ok::<_, BoxError>(json!({ "hello": name })) }.boxed()
                }),
            }))
            .unwrap();
    }

    fn middleware(&mut self, path: &str, priority: i32, middleware: MiddlewareRef) {
        self.router
            .add(Handler::Middleware(MiddlewareHandler {
                path: path.to_string(),
                priority,
                middleware,
            }))
            .unwrap();
    }

    async fn fetch(&self, uri: &str) -> http::Response<Bytes> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Bytes::new())
            .unwrap();
        let matches = self.router.match_route(request.method(), request.uri().path());
        self.engine()
            .execute(ExecutionOptions {
                request,
                matches,
                scope: Scope::DEFAULT,
                env: None,
            })
            .await
    }
}

fn body(response: &http::Response<Bytes>) -> Value {
    serde_json::from_slice(response.body()).unwrap()
}

#[tokio::test]
async fn test_no_method_match_is_not_found() {
    let mut harness = Harness::new();
    harness.method("/greet", Vec::new(), Vec::new(), Arc::new(AtomicUsize::new(0)));

    let response = harness.fetch("/missing").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body(&response), json!({ "error": "Not Found" }));
}

#[tokio::test]
async fn test_method_receives_params() {
    let mut harness = Harness::new();
    let calls = Arc::new(AtomicUsize::new(0));
    harness.method("/greet/:name", Vec::new(), vec![param("name")], calls.clone());

    let response = harness.fetch("/greet/ada").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body(&response), json!({ "hello": "ada" }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_interceptor_short_circuits_method() {
    let mut harness = Harness::new();
    let inner_runs = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let blocker = interceptor_fn(&harness.injector, |_ctx, _next| async { Ok::<_, BoxError>(json!("blocked")) }).unwrap();
    let runs = inner_runs.clone();
    let inner = interceptor_fn(&harness.injector, move |_ctx, next: CallNext| {
        runs.fetch_add(1, Ordering::SeqCst);
        next.run()
    })
    .unwrap();
    harness.method("/greet", vec![blocker, inner], Vec::new(), calls.clone());

    let response = harness.fetch("/greet").await;
    assert_eq!(body(&response), json!("blocked"));
    assert_eq!(inner_runs.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

struct Shout;

#[async_trait]
impl Interceptor for Shout {
    async fn intercept(&self, _ctx: Arc<ExecutionContext>, next: CallNext) -> Result<Value, BoxError> {
        let value = next.run().await?;
        Ok(json!(value.to_string().to_uppercase()))
    }
}

#[tokio::test]
async fn test_interceptors_nest_outermost_first() {
    let mut harness = Harness::new();
    harness
        .injector
        .declare_constructor::<Shout, _>([], |_| Ok(Shout))
        .unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = order.clone();
    let outer = interceptor_fn(&harness.injector, move |_ctx, next: CallNext| {
        log.lock().push(next.remaining());
        next.run()
    })
    .unwrap();
    harness.method(
        "/greet",
        vec![outer, InterceptorRef::of::<Shout>()],
        Vec::new(),
        Arc::new(AtomicUsize::new(0)),
    );

    let response = harness.fetch("/greet").await;
    assert_eq!(body(&response), json!(r#"{"HELLO":"WORLD"}"#));
    assert_eq!(*order.lock(), vec![1]);
}

#[tokio::test]
async fn test_middleware_runs_in_priority_order() {
    let mut harness = Harness::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let log = order.clone();
    let low = middleware_fn(&harness.injector, move |_ctx, next: Next| {
        log.lock().push("low");
        next.run()
    })
    .unwrap();
    let log = order.clone();
    let high = middleware_fn(&harness.injector, move |ctx: Arc<ExecutionContext>, next: Next| {
        log.lock().push("high");
        async move {
            ctx.set_data("greeting", "hi".to_string());
            next.run().await?;
            ctx.res().header("x-handled", "yes")?;
            Ok::<_, BoxError>(())
        }
    })
    .unwrap();
    harness.middleware("/*", 0, low);
    harness.middleware("/greet", 10, high);
    harness.method(
        "/greet",
        Vec::new(),
        vec![resolver(|ctx| {
            Ok(ctx.data::<String>("greeting").map(|g| (*g).clone()).unwrap_or_default())
        })],
        Arc::new(AtomicUsize::new(0)),
    );

    let response = harness.fetch("/greet").await;
    assert_eq!(*order.lock(), vec!["high", "low"]);
    assert_eq!(body(&response), json!({ "hello": "hi" }));
    assert_eq!(response.headers()["x-handled"], "yes");
}

#[tokio::test]
async fn test_middleware_can_answer_without_next() {
    let mut harness = Harness::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let guard = middleware_fn(&harness.injector, |ctx: Arc<ExecutionContext>, _next| async move {
        ctx.res().status(StatusCode::UNAUTHORIZED).text("denied");
        Ok(())
    })
    .unwrap();
    harness.middleware("/*", 0, guard);
    harness.method("/greet", Vec::new(), Vec::new(), calls.clone());

    let response = harness.fetch("/greet").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.body(), "denied");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_middleware_failure_reaches_error_handler_once() {
    let mut harness = Harness::new();
    let handled = Arc::new(AtomicUsize::new(0));
    let later = Arc::new(AtomicUsize::new(0));
    let calls = Arc::new(AtomicUsize::new(0));

    let counter = handled.clone();
    harness.error_handler = error_fn(&harness.injector, move |ctx: Arc<ExecutionContext>, error| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            ctx.res()
                .status(StatusCode::BAD_GATEWAY)
                .json(&json!({ "error": error.to_string() }))?;
            Ok::<_, BoxError>(())
        }
    })
    .unwrap();

    let failing = middleware_fn(&harness.injector, |_ctx, _next| async {
        Err::<(), _>(BoxError::from("upstream down"))
    })
    .unwrap();
    let runs = later.clone();
    let downstream = middleware_fn(&harness.injector, move |_ctx, next: Next| {
        runs.fetch_add(1, Ordering::SeqCst);
        next.run()
    })
    .unwrap();
    harness.middleware("/*", 1, failing);
    harness.middleware("/*", 0, downstream);
    harness.method("/greet", Vec::new(), Vec::new(), calls.clone());

    let response = harness.fetch("/greet").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body(&response), json!({ "error": "upstream down" }));
    assert_eq!(handled.load(Ordering::SeqCst), 1);
    assert_eq!(later.load(Ordering::SeqCst), 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_error_in_method_after_next_is_handled_once() {
    let mut harness = Harness::new();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    harness.error_handler = error_fn(&harness.injector, move |ctx: Arc<ExecutionContext>, _error| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(())
        }
    })
    .unwrap();

    let passthrough = middleware_fn(&harness.injector, |_ctx, next: Next| next.run()).unwrap();
    harness.middleware("/*", 0, passthrough);
    let failing = interceptor_fn(&harness.injector, |_ctx, _next| async {
        Err::<Value, _>(BoxError::from("boom"))
    })
    .unwrap();
    harness.method("/greet", vec![failing], Vec::new(), Arc::new(AtomicUsize::new(0)));

    let response = harness.fetch("/greet").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_foreign_next_is_chain_corruption() {
    let mut harness = Harness::new();
    let seen = Arc::new(Mutex::new(None));

    let log = seen.clone();
    harness.error_handler = error_fn(&harness.injector, move |ctx: Arc<ExecutionContext>, error| {
        *log.lock() = Some(error.is_chain_corrupted());
        async move {
            ctx.set_status(StatusCode::INTERNAL_SERVER_ERROR);
            Ok(())
        }
    })
    .unwrap();

    let engine = harness.engine();
    let stranger = Arc::new(MiddlewareHandler {
        path: "/*".to_string(),
        priority: 0,
        middleware: MiddlewareRef::of::<Passthrough>(),
    });
    let forger = middleware_fn(&harness.injector, move |ctx: Arc<ExecutionContext>, next: Next| {
        let forged = Next::new(engine.clone(), ctx, next.position(), stranger.clone());
        forged.run()
    })
    .unwrap();
    harness.middleware("/*", 0, forger);
    harness.method("/greet", Vec::new(), Vec::new(), Arc::new(AtomicUsize::new(0)));

    let response = harness.fetch("/greet").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(*seen.lock(), Some(true));
}

struct Passthrough;

#[async_trait]
impl Middleware for Passthrough {
    async fn handle(&self, _ctx: Arc<ExecutionContext>, next: Next) -> Result<(), BoxError> {
        next.run().await
    }
}

struct Broken;

#[async_trait]
impl ErrorHandler for Broken {
    async fn on_error(&self, _ctx: Arc<ExecutionContext>, _error: ExecutionError) -> Result<(), BoxError> {
        Err("error handler is broken".into())
    }
}

#[tokio::test]
async fn test_failing_error_handler_yields_plain_500() {
    let mut harness = Harness::new();
    harness
        .injector
        .declare_constructor::<Broken, _>([], |_| Ok(Broken))
        .unwrap();
    harness.error_handler = ErrorRef::of::<Broken>();
    harness.not_found = not_found_fn(&harness.injector, |_ctx| async { Err::<(), _>(BoxError::from("no fallback")) }).unwrap();

    let response = harness.fetch("/anything").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body(), "Internal Server Error");
}

#[tokio::test]
async fn test_context_exposes_tags_and_cursor() {
    let mut harness = Harness::new();
    harness
        .tags
        .set(MethodTarget::of::<Greeter>("greet"), "role", "admin".to_string());
    let seen = Arc::new(Mutex::new(None));

    let log = seen.clone();
    let reader = middleware_fn(&harness.injector, move |ctx: Arc<ExecutionContext>, next: Next| {
        let log = log.clone();
        async move {
            *log.lock() = Some((ctx.current(), ctx.tag::<String>("role", TagMode::MethodFirst)));
            next.run().await
        }
    })
    .unwrap();
    harness.middleware("/*", 0, reader);
    harness.method(
        "/greet",
        Vec::new(),
        vec![resolver(|_| Ok(String::from("tagged"))), context()],
        Arc::new(AtomicUsize::new(0)),
    );

    let response = harness.fetch("/greet").await;
    assert_eq!(body(&response), json!({ "hello": "tagged" }));
    let (cursor, role) = seen.lock().take().unwrap();
    assert_eq!(cursor, Cursor::Middleware(0));
    assert_eq!(role.as_deref().map(String::as_str), Some("admin"));
}
