//! Canonical routing rule representation.
//!
//! # Responsibilities
//! - Hold one routing intent: host, ordered path rules, default backend
//! - Derive `is_catch_all` from its inputs on every read
//! - Reject malformed rules at construction
//!
//! # Design Decisions
//! - Fields are private; every mutation goes through a validating builder
//! - `"_"` and `""` are both "no host"; stored as `""`
//! - Hosts are case-insensitive and stored lowercase

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host key of the synthetic default server block.
pub const DEFAULT_SERVER: &str = "_";

/// Stable external identifier of a rule (`namespace/name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId {
    pub namespace: String,
    pub name: String,
}

impl RuleId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for RuleId {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((ns, name)) if !ns.is_empty() && !name.is_empty() => Ok(Self::new(ns, name)),
            _ => Err(RuleError::InvalidId(s.to_string())),
        }
    }
}

/// Reference to a backend service port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BackendRef {
    pub service: String,
    pub port: u16,
}

impl BackendRef {
    pub fn new(service: impl Into<String>, port: u16) -> Self {
        Self {
            service: service.into(),
            port,
        }
    }

    fn validate(&self) -> Result<(), RuleError> {
        if self.service.is_empty() {
            return Err(RuleError::InvalidBackend("empty service name".into()));
        }
        if self.port == 0 {
            return Err(RuleError::InvalidBackend(format!(
                "service {} has port 0",
                self.service
            )));
        }
        Ok(())
    }
}

impl fmt::Display for BackendRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.service, self.port)
    }
}

/// A path prefix routed to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub prefix: String,
    pub backend: BackendRef,
}

impl PathRule {
    pub fn new(prefix: impl Into<String>, backend: BackendRef) -> Self {
        Self {
            prefix: prefix.into(),
            backend,
        }
    }
}

/// Reasons a rule is rejected at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid rule identifier {0:?}, expected namespace/name")]
    InvalidId(String),
    #[error("invalid host {0:?}")]
    InvalidHost(String),
    #[error("path {0:?} must start with '/'")]
    InvalidPath(String),
    #[error("path {0:?} declared more than once")]
    DuplicatePath(String),
    #[error("invalid backend: {0}")]
    InvalidBackend(String),
    #[error("rule has neither paths nor a default backend")]
    NoRoutes,
}

/// One routing intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    id: RuleId,
    host: String,
    paths: Vec<PathRule>,
    default_backend: Option<BackendRef>,
}

impl Rule {
    /// Build and validate a rule.
    pub fn new(
        id: RuleId,
        host: impl Into<String>,
        paths: Vec<PathRule>,
        default_backend: Option<BackendRef>,
    ) -> Result<Self, RuleError> {
        if id.namespace.is_empty() || id.name.is_empty() {
            return Err(RuleError::InvalidId(id.to_string()));
        }

        let host = normalize_host(host.into())?;

        let mut seen = std::collections::HashSet::new();
        for path in &paths {
            if !path.prefix.starts_with('/') {
                return Err(RuleError::InvalidPath(path.prefix.clone()));
            }
            if !seen.insert(path.prefix.as_str()) {
                return Err(RuleError::DuplicatePath(path.prefix.clone()));
            }
            path.backend.validate()?;
        }

        if let Some(backend) = &default_backend {
            backend.validate()?;
        } else if paths.is_empty() {
            return Err(RuleError::NoRoutes);
        }

        Ok(Self {
            id,
            host,
            paths,
            default_backend,
        })
    }

    /// A host-specific rule routing `paths` for `host`.
    pub fn host(id: RuleId, host: impl Into<String>, paths: Vec<PathRule>) -> Result<Self, RuleError> {
        Self::new(id, host, paths, None)
    }

    /// A rule with no host and no paths, only a default backend.
    pub fn catch_all(id: RuleId, backend: BackendRef) -> Result<Self, RuleError> {
        Self::new(id, "", Vec::new(), Some(backend))
    }

    /// Replace the routing content of this rule, keeping its identity.
    pub fn with_routes(
        &self,
        host: impl Into<String>,
        paths: Vec<PathRule>,
        default_backend: Option<BackendRef>,
    ) -> Result<Self, RuleError> {
        Self::new(self.id.clone(), host, paths, default_backend)
    }

    pub fn id(&self) -> &RuleId {
        &self.id
    }

    /// The host constraint; empty when the rule matches any host.
    pub fn host_name(&self) -> &str {
        &self.host
    }

    pub fn paths(&self) -> &[PathRule] {
        &self.paths
    }

    pub fn default_backend(&self) -> Option<&BackendRef> {
        self.default_backend.as_ref()
    }

    pub fn has_host(&self) -> bool {
        !self.host.is_empty()
    }

    /// True iff the rule has no host, no paths, and a default backend.
    pub fn is_catch_all(&self) -> bool {
        self.host.is_empty() && self.paths.is_empty() && self.default_backend.is_some()
    }
}

fn normalize_host(host: String) -> Result<String, RuleError> {
    let host = host.trim().to_lowercase();
    if host.is_empty() || host == DEFAULT_SERVER {
        return Ok(String::new());
    }
    let valid_chars = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '*');
    if !valid_chars || host == "*" || host.starts_with('.') || host.ends_with('.') {
        return Err(RuleError::InvalidHost(host));
    }
    Ok(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn svc() -> BackendRef {
        BackendRef::new("http-svc", 80)
    }

    #[test]
    fn test_catch_all_is_derived() {
        let id = RuleId::new("default", "foo");
        let rule = Rule::host(id, "foo", vec![PathRule::new("/", svc())]).unwrap();
        assert!(!rule.is_catch_all());

        let updated = rule.with_routes("", Vec::new(), Some(svc())).unwrap();
        assert!(updated.is_catch_all());
        assert_eq!(updated.id(), rule.id());

        // A host with only a default backend is not catch-all.
        let hosted = rule.with_routes("foo", Vec::new(), Some(svc())).unwrap();
        assert!(!hosted.is_catch_all());
    }

    #[test]
    fn test_underscore_host_means_no_host() {
        let rule = Rule::new(RuleId::new("ns", "a"), "_", Vec::new(), Some(svc())).unwrap();
        assert_eq!(rule.host_name(), "");
        assert!(rule.is_catch_all());
    }

    #[test]
    fn test_host_is_lowercased() {
        let rule = Rule::host(RuleId::new("ns", "a"), "Foo.Example.COM", vec![PathRule::new("/", svc())]).unwrap();
        assert_eq!(rule.host_name(), "foo.example.com");
    }

    #[test]
    fn test_malformed_rules_rejected() {
        let id = RuleId::new("ns", "bad");
        assert_eq!(
            Rule::new(id.clone(), "", Vec::new(), None),
            Err(RuleError::NoRoutes)
        );
        assert!(matches!(
            Rule::host(id.clone(), "foo", vec![PathRule::new("api", svc())]),
            Err(RuleError::InvalidPath(_))
        ));
        assert!(matches!(
            Rule::host(id.clone(), "foo bar", vec![PathRule::new("/", svc())]),
            Err(RuleError::InvalidHost(_))
        ));
        assert!(matches!(
            Rule::host(
                id.clone(),
                "foo",
                vec![PathRule::new("/", svc()), PathRule::new("/", svc())]
            ),
            Err(RuleError::DuplicatePath(_))
        ));
        assert!(matches!(
            Rule::catch_all(id.clone(), BackendRef::new("svc", 0)),
            Err(RuleError::InvalidBackend(_))
        ));
        assert!(matches!(
            Rule::catch_all(RuleId::new("", "x"), svc()),
            Err(RuleError::InvalidId(_))
        ));
    }

    #[test]
    fn test_rule_id_parse() {
        let id: RuleId = "default/catch-all".parse().unwrap();
        assert_eq!(id, RuleId::new("default", "catch-all"));
        assert_eq!(id.to_string(), "default/catch-all");
        assert!("no-slash".parse::<RuleId>().is_err());
    }
}
