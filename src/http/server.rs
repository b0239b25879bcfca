//! HTTP proxy serving from the live configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy fallback handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Select server block by Host header, location by path prefix
//! - Resolve the upstream service and forward the request
//!
//! # Design Decisions
//! - Every request loads the current snapshot once; a reload mid-request
//!   never mixes two documents
//! - The global default upstream answers 404 itself when no service backs it

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode, Uri, Version},
    response::{IntoResponse, Response},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::IngressConfig;
use crate::lifecycle::shutdown;
use crate::observability::metrics;
use crate::reconcile::LiveConfig;
use crate::rules::BackendRef;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub live: Arc<LiveConfig>,
    pub services: Arc<BTreeMap<String, String>>,
    pub client: Client<HttpConnector, Body>,
}

impl AppState {
    /// `host:port` for a backend, if its service is known.
    fn resolve(&self, backend: &BackendRef) -> Option<String> {
        self.services
            .get(&backend.service)
            .map(|host| format!("{}:{}", host, backend.port))
    }
}

/// HTTP server for the ingress proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(config: &IngressConfig, live: Arc<LiveConfig>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            live,
            services: Arc::new(config.services.clone()),
            client,
        };

        Self {
            router: Self::build_router(config, state),
        }
    }

    #[allow(deprecated)]
    fn build_router(config: &IngressConfig, state: AppState) -> Router {
        Router::new()
            .fallback(proxy_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until the shutdown signal, draining in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown_rx))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Host the request targets, lowercased and without port.
fn request_host(request: &Request<Body>) -> String {
    let raw = request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().host())
        .unwrap_or_default();

    let host = if raw.starts_with('[') {
        raw.split_inclusive(']').next().unwrap_or(raw)
    } else {
        raw.split(':').next().unwrap_or(raw)
    };
    host.to_lowercase()
}

async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let host = request_host(&request);
    let snapshot = state.live.current();
    let block = snapshot.document.select(&host);
    let (upstream, ingress) = block.route(request.uri().path());

    tracing::debug!(
        host = %host,
        server = %block.host,
        upstream = %upstream.name,
        ingress = ?ingress,
        generation = snapshot.generation,
        "Routing request"
    );

    let Some(authority) = state.resolve(&upstream.backend) else {
        let (status, body) = if upstream.is_default() {
            (StatusCode::NOT_FOUND, "default backend - 404")
        } else {
            tracing::warn!(upstream = %upstream.name, service = %upstream.backend.service, "No address for service");
            (StatusCode::SERVICE_UNAVAILABLE, "Service unavailable")
        };
        metrics::record_request(status.as_u16(), &upstream.name, start);
        return (status, body).into_response();
    };

    let (mut parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = match Uri::builder()
        .scheme("http")
        .authority(authority.as_str())
        .path_and_query(path_and_query)
        .build()
    {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(error = %e, authority = %authority, "Invalid upstream address");
            metrics::record_request(502, &upstream.name, start);
            return (StatusCode::BAD_GATEWAY, "Invalid upstream address").into_response();
        }
    };
    parts.version = Version::HTTP_11;
    if let Ok(value) = HeaderValue::from_str(&host) {
        parts.headers.insert("x-forwarded-host", value);
    }

    let upstream_response: Result<hyper::Response<hyper::body::Incoming>, _> =
        state.client.request(Request::from_parts(parts, body)).await;
    match upstream_response {
        Ok(response) => {
            metrics::record_request(response.status().as_u16(), &upstream.name, start);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(upstream = %upstream.name, error = %e, "Upstream error");
            metrics::record_request(502, &upstream.name, start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
