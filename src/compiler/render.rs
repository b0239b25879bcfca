//! Deterministic text rendering of a configuration document.
//!
//! The output uses nginx directive syntax so an external server can load
//! it directly. Rendering is a pure function of the document; the content
//! hash of the rendered text is what the reconciler compares to detect
//! no-op recomputations.

use std::fmt::Write;

use sha2::{Digest, Sha256};

use crate::compiler::document::{ConfigDocument, ServerBlock};

/// Render the document as nginx-style server blocks.
pub fn render(doc: &ConfigDocument) -> String {
    let mut out = String::new();
    for block in doc.servers() {
        render_server(&mut out, block);
    }
    out
}

/// Hex sha256 of the rendered document.
pub fn content_hash(rendered: &str) -> String {
    format!("{:x}", Sha256::digest(rendered.as_bytes()))
}

fn render_server(out: &mut String, block: &ServerBlock) {
    let ingress = block
        .ingress
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_default();

    // Writing into a String cannot fail.
    let _ = writeln!(out, "## start server {}", block.host);
    let _ = writeln!(out, "server {{");
    let _ = writeln!(out, "    server_name {};", block.host);
    if block.is_default() {
        let _ = writeln!(out, "    listen 80 default_server;");
    } else {
        let _ = writeln!(out, "    listen 80;");
    }
    let _ = writeln!(out);

    for location in &block.locations {
        let _ = writeln!(out, "    location {} {{", location.path);
        let _ = writeln!(out, "        set $ingress_name \"{}\";", location.ingress);
        let _ = writeln!(
            out,
            "        set $proxy_upstream_name \"{}\";",
            location.upstream.name
        );
        let _ = writeln!(out, "        proxy_pass http://{};", location.upstream.backend);
        let _ = writeln!(out, "    }}");
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "    # default route");
    let _ = writeln!(out, "    set $ingress_name \"{}\";", ingress);
    let _ = writeln!(
        out,
        "    set $proxy_upstream_name \"{}\";",
        block.default_upstream.name
    );
    let _ = writeln!(out, "    proxy_pass http://{};", block.default_upstream.backend);
    let _ = writeln!(out, "}}");
    let _ = writeln!(out, "## end server {}", block.host);
    let _ = writeln!(out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::rules::{BackendRef, PathRule, Rule, RuleId};

    #[test]
    fn test_render_default_block() {
        let doc = compile(&[], &BackendRef::new("default-http-backend", 80));
        let text = render(&doc);
        assert!(text.contains("server_name _;"));
        assert!(text.contains(r#"set $ingress_name "";"#));
        assert!(text.contains(r#"set $proxy_upstream_name "upstream-default-backend";"#));
        assert!(text.contains("listen 80 default_server;"));
    }

    #[test]
    fn test_render_host_block() {
        let rule = Rule::host(
            RuleId::new("default", "foo"),
            "foo",
            vec![PathRule::new("/", BackendRef::new("http-svc", 80))],
        )
        .unwrap();
        let text = render(&compile(&[rule], &BackendRef::new("default-http-backend", 80)));
        assert!(text.contains("server_name foo;"));
        assert!(text.contains(r#"set $ingress_name "default/foo";"#));
        assert!(text.contains(r#"set $proxy_upstream_name "default-http-svc-80";"#));
        assert!(text.find("server_name _;") < text.find("server_name foo;"));
    }

    #[test]
    fn test_hash_tracks_content() {
        let backend = BackendRef::new("default-http-backend", 80);
        let empty = render(&compile(&[], &backend));
        let rule = Rule::catch_all(RuleId::new("default", "catch-all"), BackendRef::new("http-svc", 80)).unwrap();
        let with_catch_all = render(&compile(&[rule], &backend));

        assert_eq!(content_hash(&empty), content_hash(&render(&compile(&[], &backend))));
        assert_ne!(content_hash(&empty), content_hash(&with_catch_all));
        assert_eq!(content_hash(&empty).len(), 64);
    }
}
