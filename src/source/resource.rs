//! On-disk routing resource format.
//!
//! One TOML file per resource:
//!
//! ```toml
//! namespace = "default"
//! name = "foo"
//! host = "foo"
//!
//! [[paths]]
//! path = "/"
//! backend = { service = "http-svc", port = 80 }
//! ```
//!
//! A catch-all resource omits `host` and `paths` and sets
//! `default_backend = { service = "http-svc", port = 80 }`.

use serde::{Deserialize, Serialize};

use crate::rules::{BackendRef, PathRule, Rule, RuleError, RuleId};

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathSpec {
    pub path: String,
    pub backend: BackendRef,
}

/// A routing resource as written by operators.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngressResource {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Falls back to the file stem when omitted.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub paths: Vec<PathSpec>,

    #[serde(default)]
    pub default_backend: Option<BackendRef>,
}

impl IngressResource {
    /// Convert into a validated rule, naming it `fallback_name` if the
    /// resource has no explicit name.
    pub fn into_rule(self, fallback_name: &str) -> Result<Rule, RuleError> {
        let name = self.name.unwrap_or_else(|| fallback_name.to_string());
        let paths = self
            .paths
            .into_iter()
            .map(|spec| PathRule::new(spec.path, spec.backend))
            .collect();
        Rule::new(
            RuleId::new(self.namespace, name),
            self.host.unwrap_or_default(),
            paths,
            self.default_backend,
        )
    }
}
