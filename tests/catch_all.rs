//! End-to-end behavior of catch-all rules through the controller and proxy.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use common::*;
use ingress_sync::config::{ControllerConfig, IngressConfig};
use ingress_sync::reconcile::{InProcess, LiveConfig};
use ingress_sync::rules::{BackendRef, Rule};
use ingress_sync::source::DirectorySource;
use ingress_sync::{spawn_controller, HttpServer, Shutdown};

/// Proxy router that resolves `http-svc` to the local mock backend.
fn proxy(live: Arc<LiveConfig>) -> axum::Router {
    let mut services = BTreeMap::new();
    services.insert("http-svc".to_string(), "127.0.0.1".to_string());
    let config = IngressConfig {
        services,
        ..IngressConfig::default()
    };
    HttpServer::new(&config, live).router()
}

fn get(host: &str, path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("Host", host)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_suppressed_catch_all_leaves_default_server_untouched() {
    let shutdown = Shutdown::new();
    let (source, controller) = memory_controller(true, &shutdown);

    source
        .create(Rule::catch_all(id("catch-all"), BackendRef::new("http-svc", 80)).unwrap())
        .unwrap();
    source
        .create(host_rule("foo", "foo", BackendRef::new("http-svc", 80)))
        .unwrap();

    let outcome = controller
        .observer
        .wait_until(|s| s.document.has_server("foo"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());

    let snapshot = controller.live.current();
    let default = server_section(&snapshot.rendered, "_").unwrap();
    assert!(default.contains("set $ingress_name \"\";"));
    assert!(default.contains("set $proxy_upstream_name \"upstream-default-backend\";"));
    assert!(!default.contains("catch-all"));

    let foo = server_section(&snapshot.rendered, "foo").unwrap();
    assert!(foo.contains("server_name foo;"));
    assert!(foo.contains("default/foo"));

    shutdown.trigger();
    controller.task.await.unwrap();
}

#[tokio::test]
async fn test_enabled_catch_all_owns_default_server() {
    let shutdown = Shutdown::new();
    let (source, controller) = memory_controller(false, &shutdown);

    source
        .create(Rule::catch_all(id("catch-all"), BackendRef::new("http-svc", 80)).unwrap())
        .unwrap();

    let outcome = controller
        .observer
        .wait_until(
            |s| !s.document.default_server().default_upstream.is_default(),
            CONVERGE_TIMEOUT,
        )
        .await;
    assert!(outcome.is_converged());

    let snapshot = controller.live.current();
    let default = server_section(&snapshot.rendered, "_").unwrap();
    assert!(default.contains("set $ingress_name \"default/catch-all\";"));
    assert!(default.contains("set $proxy_upstream_name \"default-http-svc-80\";"));

    shutdown.trigger();
    controller.task.await.unwrap();
}

#[tokio::test]
async fn test_host_rule_turned_catch_all_drops_its_server() {
    let backend_port = start_mock_backend("hello from http-svc").await;
    let backend = BackendRef::new("http-svc", backend_port);

    let shutdown = Shutdown::new();
    let (source, controller) = memory_controller(false, &shutdown);
    let app = proxy(controller.live.clone());

    source.create(host_rule("foo", "foo", backend.clone())).unwrap();
    let outcome = controller
        .observer
        .wait_until(|s| s.document.has_server("foo"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());

    let res = app.clone().oneshot(get("foo", "/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = to_bytes(res.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"hello from http-svc");

    // Unknown hosts fall through to the default backend, which has no service.
    let res = app.clone().oneshot(get("bar", "/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    source
        .update(Rule::catch_all(id("foo"), backend.clone()).unwrap())
        .unwrap();
    let outcome = controller
        .observer
        .wait_until(|s| !s.document.has_server("foo"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());

    let snapshot = outcome.snapshot().unwrap();
    assert_eq!(
        snapshot.document.default_server().ingress.as_ref(),
        Some(&id("foo"))
    );

    // Every host now lands on the catch-all backend.
    let res = app.clone().oneshot(get("foo", "/")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let res = app.oneshot(get("bar", "/anything")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    shutdown.trigger();
    controller.task.await.unwrap();
}

#[tokio::test]
async fn test_rule_directory_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("foo.toml"),
        r#"
host = "foo"

[[paths]]
path = "/"
backend = { service = "http-svc", port = 80 }
"#,
    )
    .unwrap();

    let shutdown = Shutdown::new();
    let controller = spawn_controller(
        test_config(true),
        Arc::new(DirectorySource::new(dir.path())),
        Arc::new(InProcess),
        &shutdown,
    );

    let outcome = controller
        .observer
        .wait_until(|s| s.document.has_server("foo"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());

    std::fs::write(
        dir.path().join("catch-all.toml"),
        r#"default_backend = { service = "http-svc", port = 80 }"#,
    )
    .unwrap();
    std::fs::write(
        dir.path().join("bar.toml"),
        r#"
host = "bar"

[[paths]]
path = "/api"
backend = { service = "api-svc", port = 8080 }
"#,
    )
    .unwrap();

    let outcome = controller
        .observer
        .wait_until(|s| s.document.has_server("bar"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());

    // The catch-all file is loaded but suppressed.
    let snapshot = controller.live.current();
    assert!(snapshot.document.default_server().ingress.is_none());
    assert!(snapshot.document.default_server().default_upstream.is_default());

    std::fs::remove_file(dir.path().join("foo.toml")).unwrap();
    let outcome = controller
        .observer
        .wait_until(|s| !s.document.has_server("foo"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());

    shutdown.trigger();
    controller.task.await.unwrap();
}

#[tokio::test]
async fn test_invalid_rule_edit_survives_periodic_relist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foo.toml");
    let valid = r#"
host = "foo"

[[paths]]
path = "/"
backend = { service = "http-svc", port = 80 }
"#;
    std::fs::write(&path, valid).unwrap();

    let shutdown = Shutdown::new();
    let config = ControllerConfig {
        resync_interval_secs: 1,
        ..test_config(false)
    };
    let controller = spawn_controller(
        config,
        Arc::new(DirectorySource::new(dir.path())),
        Arc::new(InProcess),
        &shutdown,
    );

    let outcome = controller
        .observer
        .wait_until(|s| s.document.has_server("foo"), CONVERGE_TIMEOUT)
        .await;
    assert!(outcome.is_converged());
    let applied = controller.live.generation();

    std::fs::write(&path, valid.replace("path = \"/\"", "path = \"api\"")).unwrap();

    // Let the watch event and at least two periodic relists go by.
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let snapshot = controller.live.current();
    assert!(snapshot.document.has_server("foo"));
    assert_eq!(snapshot.generation, applied);

    shutdown.trigger();
    controller.task.await.unwrap();
}
