//! HTTP server built on axum.

use std::any::Any;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::response::{IntoResponse, Response};
use brass_framework::Application;
use bytes::Bytes;
use http::StatusCode;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::{TransportError, TransportResult};

/// Largest request body buffered before dispatch.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Environment handed to [`Application::fetch`] for every HTTP request.
///
/// Read it in a handler with `ctx.env::<ClientInfo>()`.
#[derive(Debug, Clone, Copy)]
pub struct ClientInfo {
    /// Peer address, when the server was started with [`serve`].
    pub remote_addr: Option<SocketAddr>,
}

/// An axum router sending every request to `app`.
///
/// Can be nested into a larger axum application.
pub fn router(app: Application) -> Router {
    Router::new().fallback(dispatch).with_state(app)
}

async fn dispatch(State(app): State<Application>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let remote_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let body: Bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
        }
    };

    debug!(method = %parts.method, uri = %parts.uri, len = body.len(), "Received HTTP request");
    let env: Arc<dyn Any + Send + Sync> = Arc::new(ClientInfo { remote_addr });
    let response = app
        .fetch(http::Request::from_parts(parts, body), Some(env))
        .await;
    response.map(Body::from)
}

/// Serves `app` on `addr` until ctrl-c.
pub async fn serve(app: Application, addr: &str) -> TransportResult<()> {
    serve_with_shutdown(app, addr, shutdown_signal()).await
}

/// Serves `app` on `addr` until `signal` completes, then drains open
/// connections.
pub async fn serve_with_shutdown<F>(app: Application, addr: &str, signal: F) -> TransportResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.map_err(|source| TransportError::Bind {
        addr: addr.to_string(),
        source,
    })?;
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, "HTTP server listening");

    axum::serve(
        listener,
        router(app).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(signal)
    .await?;

    info!("HTTP server stopped");
    Ok(())
}

/// Completes on ctrl-c.
pub async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

#[cfg(test)]
mod tests {
    use brass_core::BoxError;
    use brass_framework::param::{resolver, text_body};
    use brass_framework::{ApplicationOptions, ExecutionContext, MethodOptions, Registry};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;

    struct Echo;

    fn app() -> Application {
        let registry = Registry::new();
        registry
            .controllers()
            .declare_controller::<Echo, _>("/echo", [], |_| Ok(Echo))
            .unwrap();
        registry
            .methods()
            .bind::<Echo, _, _, _>(
                "post",
                MethodOptions::post("/").params([
                    text_body(),
                    resolver(|ctx: &ExecutionContext| {
                        Ok(ctx.env::<ClientInfo>().map(|info| info.remote_addr.is_some()))
                    }),
                ]),
                |_, params| async move {
                    let body = params.take::<String>(0)?;
                    let connected = params.take::<Option<bool>>(1)?;
                    Ok::<_, BoxError>(json!({ "body": body, "connected": connected }))
                },
            )
            .unwrap();
        Application::new(
            registry,
            ApplicationOptions::new().controller(brass_core::Target::of::<Echo>()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_router_dispatches_to_application() {
        let request = http::Request::builder()
            .method("POST")
            .uri("/echo")
            .body(Body::from("ping"))
            .unwrap();

        let response = router(app()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "body": "ping", "connected": false }));
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let request = http::Request::builder()
            .uri("/nowhere")
            .body(Body::empty())
            .unwrap();

        let response = router(app()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
