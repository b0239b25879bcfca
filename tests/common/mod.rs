//! Shared utilities for integration tests.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use ingress_sync::config::ControllerConfig;
use ingress_sync::reconcile::InProcess;
use ingress_sync::rules::{BackendRef, PathRule, Rule, RuleId};
use ingress_sync::source::MemorySource;
use ingress_sync::{spawn_controller, Controller, Shutdown};

pub const CONVERGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Start a mock backend on an ephemeral port that answers every request
/// with `response`. Returns the bound port.
pub async fn start_mock_backend(response: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let response_str = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response.len(),
                    response
                );
                let _ = socket.write_all(response_str.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    port
}

pub fn test_config(suppress_catch_all: bool) -> ControllerConfig {
    ControllerConfig {
        suppress_catch_all,
        retry_base_delay_ms: 10,
        retry_max_delay_ms: 100,
        poll_interval_ms: 10,
        ..ControllerConfig::default()
    }
}

/// A controller over an in-memory resource API.
pub fn memory_controller(
    suppress_catch_all: bool,
    shutdown: &Shutdown,
) -> (Arc<MemorySource>, Controller) {
    let source = Arc::new(MemorySource::new());
    let controller = spawn_controller(
        test_config(suppress_catch_all),
        source.clone(),
        Arc::new(InProcess),
        shutdown,
    );
    (source, controller)
}

pub fn id(name: &str) -> RuleId {
    RuleId::new("default", name)
}

pub fn host_rule(name: &str, host: &str, backend: BackendRef) -> Rule {
    Rule::host(id(name), host, vec![PathRule::new("/", backend)]).unwrap()
}

/// The rendered text of one server block, `## start` through `## end`.
#[allow(dead_code)]
pub fn server_section<'a>(rendered: &'a str, host: &str) -> Option<&'a str> {
    let start_marker = format!("## start server {}\n", host);
    let end_marker = format!("## end server {}\n", host);
    let start = rendered.find(&start_marker)?;
    let end = rendered[start..].find(&end_marker)? + start + end_marker.len();
    Some(&rendered[start..end])
}
