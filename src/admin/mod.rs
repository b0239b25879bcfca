//! Read-only admin API over the live configuration.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::lifecycle::shutdown;
use crate::reconcile::{LiveConfig, LoopState};

#[derive(Clone)]
pub struct AdminState {
    pub live: Arc<LiveConfig>,
    pub loop_state: watch::Receiver<LoopState>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/config", get(get_config))
        .route("/admin/servers", get(get_servers))
        .route("/admin/servers/{host}", get(get_server))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until shutdown.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(shutdown::wait(shutdown_rx))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::rules::BackendRef;

    fn state() -> AdminState {
        let (_tx, rx) = watch::channel(LoopState::Idle);
        AdminState {
            live: Arc::new(LiveConfig::new(&BackendRef::new("default-http-backend", 80))),
            loop_state: rx,
            api_key: Arc::from("secret"),
        }
    }

    fn get(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_requires_bearer_token() {
        let app = setup_admin_router(state());
        let res = app.clone().oneshot(get("/admin/status", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let res = app.oneshot(get("/admin/status", Some("wrong"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_and_config() {
        let app = setup_admin_router(state());

        let res = app.clone().oneshot(get("/admin/status", Some("secret"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
        let status: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(status["generation"], 0);
        assert_eq!(status["state"], "idle");
        assert_eq!(status["servers"], serde_json::json!(["_"]));

        let res = app.clone().oneshot(get("/admin/config", Some("secret"))).await.unwrap();
        let body = to_bytes(res.into_body(), 1024 * 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("server_name _;"));

        let res = app.clone().oneshot(get("/admin/servers/_", Some("secret"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let res = app.oneshot(get("/admin/servers/foo", Some("secret"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
