//! Catch-all aware ingress configuration sync engine.

pub mod admin;
pub mod compiler;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod resilience;
pub mod rules;
pub mod source;

pub use compiler::{compile, ConfigDocument, ServerBlock};
pub use config::IngressConfig;
pub use http::HttpServer;
pub use lifecycle::{spawn_controller, Controller, Shutdown};
pub use reconcile::{Convergence, LiveConfig, Observer, Reconciler, Snapshot};
pub use rules::{filter, BackendRef, PathRule, Rule, RuleId};
