//! Effective rule set → server configuration document.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use crate::compiler::document::{ConfigDocument, Location, ServerBlock, Upstream};
use crate::rules::{BackendRef, Rule, RuleId, DEFAULT_SERVER};

/// Compile the effective rule set into a document.
///
/// The output depends only on the set of rules, never on their order:
/// rules are visited by `RuleId`, so the smallest identifier wins both
/// location conflicts and the default block when several catch-all rules
/// survive filtering.
pub fn compile(rules: &[Rule], default_backend: &BackendRef) -> ConfigDocument {
    let mut ordered: Vec<&Rule> = rules.iter().collect();
    ordered.sort_by(|a, b| a.id().cmp(b.id()));

    let global = Upstream::default_backend(default_backend.clone());
    let mut default = ServerBlock::new(DEFAULT_SERVER, global.clone());

    if let Some(rule) = ordered.iter().find(|rule| rule.is_catch_all()) {
        if let Some(backend) = rule.default_backend() {
            default.ingress = Some(rule.id().clone());
            default.default_upstream = Upstream::for_rule(rule.id(), backend);
        }
    }

    let mut hosts: BTreeMap<&str, ServerBlock> = BTreeMap::new();

    for rule in ordered.iter().filter(|rule| !rule.is_catch_all()) {
        let block = if rule.has_host() {
            hosts
                .entry(rule.host_name())
                .or_insert_with(|| ServerBlock::new(rule.host_name(), global.clone()))
        } else {
            &mut default
        };

        for path in rule.paths() {
            add_location(block, &path.prefix, rule.id(), &path.backend);
        }

        // A rule's own default backend answers its host root unless it
        // already routes "/" explicitly.
        if let Some(backend) = rule.default_backend() {
            if !rule.paths().iter().any(|p| p.prefix == "/") {
                add_location(block, "/", rule.id(), backend);
            }
        }
    }

    let mut hosts: Vec<ServerBlock> = hosts.into_values().collect();
    sort_locations(&mut default);
    for block in &mut hosts {
        sort_locations(block);
    }

    ConfigDocument::new(default, hosts)
}

/// First writer wins; callers visit rules in identifier order.
fn add_location(block: &mut ServerBlock, path: &str, id: &RuleId, backend: &BackendRef) {
    if block.locations.iter().any(|loc| loc.path == path) {
        return;
    }
    block.locations.push(Location {
        path: path.to_string(),
        upstream: Upstream::for_rule(id, backend),
        ingress: id.clone(),
    });
}

fn sort_locations(block: &mut ServerBlock) {
    block
        .locations
        .sort_by(|a, b| (Reverse(a.path.len()), &a.path).cmp(&(Reverse(b.path.len()), &b.path)));
}
