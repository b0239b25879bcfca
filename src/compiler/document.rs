//! Server configuration document types.
//!
//! A document always carries exactly one default block (`"_"`) plus zero
//! or more host blocks in lexical host order. Documents are immutable once
//! compiled; a new document replaces the old one wholesale.

use serde::Serialize;

use crate::rules::{BackendRef, RuleId, DEFAULT_SERVER};

/// Upstream name used for the controller-wide default backend.
pub const DEFAULT_UPSTREAM: &str = "upstream-default-backend";

/// A named upstream target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Upstream {
    pub name: String,
    pub backend: BackendRef,
}

impl Upstream {
    /// The global default backend.
    pub fn default_backend(backend: BackendRef) -> Self {
        Self {
            name: DEFAULT_UPSTREAM.to_string(),
            backend,
        }
    }

    /// A backend referenced by a rule, named `<namespace>-<service>-<port>`.
    pub fn for_rule(id: &RuleId, backend: &BackendRef) -> Self {
        Self {
            name: format!("{}-{}-{}", id.namespace, backend.service, backend.port),
            backend: backend.clone(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_UPSTREAM
    }
}

/// A path prefix inside a server block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub path: String,
    pub upstream: Upstream,
    pub ingress: RuleId,
}

/// Compiled configuration for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerBlock {
    pub host: String,
    /// Rule that owns `default_upstream`; `None` for the global default.
    pub ingress: Option<RuleId>,
    pub default_upstream: Upstream,
    /// Most specific prefix first.
    pub locations: Vec<Location>,
}

impl ServerBlock {
    pub(crate) fn new(host: impl Into<String>, default_upstream: Upstream) -> Self {
        Self {
            host: host.into(),
            ingress: None,
            default_upstream,
            locations: Vec::new(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.host == DEFAULT_SERVER
    }

    /// Resolve a request path to an upstream and the rule that routed it.
    pub fn route(&self, path: &str) -> (&Upstream, Option<&RuleId>) {
        self.locations
            .iter()
            .find(|loc| path.starts_with(&loc.path))
            .map(|loc| (&loc.upstream, Some(&loc.ingress)))
            .unwrap_or((&self.default_upstream, self.ingress.as_ref()))
    }
}

/// Ordered server configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigDocument {
    default: ServerBlock,
    hosts: Vec<ServerBlock>,
}

impl ConfigDocument {
    pub(crate) fn new(default: ServerBlock, hosts: Vec<ServerBlock>) -> Self {
        Self { default, hosts }
    }

    /// The `"_"` block for unmatched traffic.
    pub fn default_server(&self) -> &ServerBlock {
        &self.default
    }

    /// All blocks, default first.
    pub fn servers(&self) -> impl Iterator<Item = &ServerBlock> {
        std::iter::once(&self.default).chain(self.hosts.iter())
    }

    /// Look up a block by host key (`"_"` for the default block).
    pub fn server(&self, host: &str) -> Option<&ServerBlock> {
        if host == DEFAULT_SERVER {
            return Some(&self.default);
        }
        self.hosts
            .binary_search_by(|block| block.host.as_str().cmp(host))
            .ok()
            .map(|idx| &self.hosts[idx])
    }

    pub fn has_server(&self, host: &str) -> bool {
        self.server(host).is_some()
    }

    /// Block that serves a request for `host`, falling back to `"_"`.
    pub fn select(&self, host: &str) -> &ServerBlock {
        self.server(host).unwrap_or(&self.default)
    }

    pub fn host_names(&self) -> impl Iterator<Item = &str> {
        self.hosts.iter().map(|block| block.host.as_str())
    }
}
