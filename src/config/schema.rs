//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! controller. All types derive Serde traits for deserialization from
//! config files.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::rules::BackendRef;

/// Root configuration for the ingress controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IngressConfig {
    /// Proxy listener configuration.
    pub listener: ListenerConfig,

    /// Reconciliation and policy settings.
    pub controller: ControllerConfig,

    /// Service name → address host used to reach backends.
    pub services: BTreeMap<String, String>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Reconciliation loop and policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Ignore rules that have no host, no paths, and only a default backend.
    pub suppress_catch_all: bool,

    /// Backend for traffic no rule claims.
    pub default_backend: BackendRef,

    /// Directory of rule files; no rules are loaded when unset.
    pub rules_dir: Option<PathBuf>,

    /// Write the rendered document here on every apply.
    pub render_path: Option<PathBuf>,

    /// Full relist interval in seconds.
    pub resync_interval_secs: u64,

    /// Deadline for one apply in seconds.
    pub apply_timeout_secs: u64,

    /// Base delay for apply/resync backoff in milliseconds.
    pub retry_base_delay_ms: u64,

    /// Maximum delay for apply/resync backoff in milliseconds.
    pub retry_max_delay_ms: u64,

    /// Convergence observer poll interval in milliseconds.
    pub poll_interval_ms: u64,
}

/// Longest accepted full relist interval (one day).
pub const MAX_RESYNC_INTERVAL_SECS: u64 = 86_400;

/// Longest accepted apply deadline.
pub const MAX_APPLY_TIMEOUT_SECS: u64 = 3_600;

/// Longest accepted retry delay (one hour).
pub const MAX_RETRY_DELAY_MS: u64 = 3_600_000;

/// Longest accepted observer poll interval.
pub const MAX_POLL_INTERVAL_MS: u64 = 60_000;

impl ControllerConfig {
    /// Relist interval, never longer than `MAX_RESYNC_INTERVAL_SECS`.
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs.min(MAX_RESYNC_INTERVAL_SECS))
    }

    pub fn apply_timeout(&self) -> Duration {
        Duration::from_secs(self.apply_timeout_secs.min(MAX_APPLY_TIMEOUT_SECS))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.min(MAX_POLL_INTERVAL_MS))
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            suppress_catch_all: false,
            default_backend: BackendRef::new("default-http-backend", 80),
            rules_dir: None,
            render_path: None,
            resync_interval_secs: 30,
            apply_timeout_secs: 10,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 10_000,
            poll_interval_ms: 100,
        }
    }
}

/// Timeout configuration for proxied requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
