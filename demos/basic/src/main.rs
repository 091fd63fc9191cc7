//! Basic Example
//!
//! A small user directory served over HTTP, showing the pieces of a Brass
//! application working together:
//!
//! - an injectable that initializes asynchronously (`Database`)
//! - a service depending on it (`UserService`)
//! - a controller with path, query and JSON body parameters
//! - a global interceptor wrapping every result in `{"data": ...}`
//! - a global timing middleware and a controller-level auth middleware
//!   that only guards methods tagged `requires_auth`
//! - custom not-found and error handlers
//!
//! # Usage
//!
//! ```bash
//! cargo run --package basic
//! curl localhost:3000/users
//! curl -X POST localhost:3000/users -d '{"name":"Grace","email":"grace@example.com"}'
//! curl -X DELETE localhost:3000/users/1 -H 'x-api-key: secret'
//! ```

mod users;

use std::sync::Arc;
use std::time::Instant;

use brass::framework::{ExecutionError, HttpError, ParamError};
use brass::prelude::*;
use http::StatusCode;
use serde_json::json;
use tracing::error;

use users::{UserController, UserError};

// ============================================================================
// Middleware
// ============================================================================

/// Rejects requests to methods tagged `requires_auth` without the API key.
struct ApiKeyAuth {
    key: String,
}

#[async_trait]
impl Middleware for ApiKeyAuth {
    async fn handle(&self, ctx: Arc<ExecutionContext>, next: Next) -> Result<(), BoxError> {
        let required = ctx
            .tag::<bool>("requires_auth", TagMode::MethodFirst)
            .is_some_and(|required| *required);

        if required && ctx.req().header("x-api-key") != Some(self.key.as_str()) {
            ctx.res()
                .status(StatusCode::UNAUTHORIZED)
                .json(&json!({ "error": "Unauthorized" }))?;
            return Ok(());
        }
        next.run().await
    }
}

// ============================================================================
// Application
// ============================================================================

fn build(api_key: &str) -> Result<(Registry, ApplicationOptions), BoxError> {
    let registry = Registry::new();
    users::declare(&registry)?;

    let api_key = api_key.to_string();
    registry
        .injector()
        .declare_constructor::<ApiKeyAuth, _>([], move |_| Ok(ApiKeyAuth { key: api_key.clone() }))?;
    registry.declare_middlewares(
        Target::of::<UserController>(),
        [MiddlewareRef::of::<ApiKeyAuth>()],
    )?;

    let timing = middleware_fn(registry.injector(), |ctx, next: Next| async move {
        let started = Instant::now();
        next.run().await?;
        let elapsed = started.elapsed().as_micros().to_string();
        ctx.res().header("x-response-time-us", &elapsed)?;
        Ok::<_, BoxError>(())
    })?;

    let envelope = interceptor_fn(registry.injector(), |_, next: CallNext| async move {
        let data = next.run().await?;
        Ok::<_, BoxError>(json!({ "data": data }))
    })?;

    let not_found = not_found_fn(registry.injector(), |ctx: Arc<ExecutionContext>| async move {
        let message = format!("No route for {} {}", ctx.req().method(), ctx.req().path());
        ctx.res()
            .status(StatusCode::NOT_FOUND)
            .json(&json!({ "error": message }))?;
        Ok::<_, BoxError>(())
    })?;

    let errors = error_fn(registry.injector(), |ctx, err: ExecutionError| async move {
        let status = match err.downcast_ref::<UserError>() {
            Some(UserError::NotFound(_)) => StatusCode::NOT_FOUND,
            Some(_) => StatusCode::BAD_REQUEST,
            None if err.downcast_ref::<HttpError>().is_some() || err.downcast_ref::<ParamError>().is_some() => {
                StatusCode::BAD_REQUEST
            }
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = if status.is_server_error() {
            error!(error = %err, "Request failed");
            "Internal Server Error".to_string()
        } else {
            err.to_string()
        };
        ctx.res().status(status).json(&json!({ "error": message }))?;
        Ok::<_, BoxError>(())
    })?;

    let options = ApplicationOptions::new()
        .controller(Target::of::<UserController>())
        .middleware(timing)
        .interceptor(envelope)
        .not_found(not_found)
        .error_handler(errors);

    Ok((registry, options))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api_key = std::env::var("API_KEY").unwrap_or_else(|_| "secret".to_string());
    let (registry, options) = build(&api_key).map_err(|e| anyhow::anyhow!(e))?;

    Server::builder()
        .search_path(env!("CARGO_MANIFEST_DIR"))
        .registry(registry)
        .options(options)
        .build()?
        .run()
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::Value;

    use super::*;

    async fn app() -> Application {
        let (registry, options) = build("secret").unwrap();
        let app = Application::new(registry, options.preload(true)).unwrap();
        app.ready().await.unwrap();
        app
    }

    async fn send(app: &Application, request: http::request::Builder, body: &str) -> (StatusCode, Value) {
        let request = request.body(Bytes::from(body.to_string())).unwrap();
        let response = app.fetch(request, None).await;
        let status = response.status();
        (status, serde_json::from_slice(response.body()).unwrap())
    }

    #[tokio::test]
    async fn test_list_wraps_result_and_times_request() {
        let app = app().await;
        let request = http::Request::builder().uri("/users?name=ada").body(Bytes::new()).unwrap();
        let response = app.fetch(request, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-response-time-us"));
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["data"][0]["name"], "Ada");
    }

    #[tokio::test]
    async fn test_create_then_find() {
        let app = app().await;
        let (status, body) = send(
            &app,
            http::Request::builder().method("POST").uri("/users"),
            r#"{"name":"Grace","email":"grace@example.com"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["id"], 2);

        let (status, body) = send(&app, http::Request::builder().uri("/users/2"), "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["email"], "grace@example.com");
    }

    #[tokio::test]
    async fn test_errors_map_to_statuses() {
        let app = app().await;

        let (status, body) = send(&app, http::Request::builder().uri("/users/42"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "user 42 not found");

        let (status, _) = send(&app, http::Request::builder().uri("/users/abc"), "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            http::Request::builder().method("POST").uri("/users"),
            "not json",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, http::Request::builder().uri("/groups"), "").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No route for GET /groups");
    }

    #[tokio::test]
    async fn test_remove_requires_api_key() {
        let app = app().await;

        let (status, _) = send(&app, http::Request::builder().method("DELETE").uri("/users/1"), "").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            &app,
            http::Request::builder()
                .method("DELETE")
                .uri("/users/1")
                .header("x-api-key", "secret"),
            "",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Ada");
    }
}
