//! Named renderer plugins (§4.7 step 2, §9 "Dynamic plugin registries").
//! Template-engine internals are out of scope (§1); this crate ships a
//! real Jinja2-compatible engine for the `jinja2` tag and an identity
//! renderer used by tests and the round-trip law (§8 law 8).

use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Renderer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render `template` against `context`. `context` is `None` for a
    /// non-dict payload (the template source is the payload itself,
    /// already inlined by the caller).
    fn render(&self, template: &str, context: Option<&serde_json::Map<String, serde_json::Value>>) -> Result<String>;
}

/// Returns the template source unchanged. Exists so the render -> parse
/// round trip (§8 law 8) has a deterministic, dependency-free pair.
pub struct IdentityRenderer;

impl Renderer for IdentityRenderer {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn render(&self, template: &str, _context: Option<&serde_json::Map<String, serde_json::Value>>) -> Result<String> {
        Ok(template.to_string())
    }
}

/// Jinja2-compatible rendering backed by `minijinja`.
pub struct Jinja2Renderer;

impl Renderer for Jinja2Renderer {
    fn name(&self) -> &'static str {
        "jinja2"
    }

    fn render(&self, template: &str, context: Option<&serde_json::Map<String, serde_json::Value>>) -> Result<String> {
        let env = minijinja::Environment::new();
        let ctx = context
            .map(|m| serde_json::Value::Object(m.clone()))
            .unwrap_or(serde_json::Value::Object(Default::default()));
        env.render_str(template, ctx)
            .map_err(|e| Error::Validation(format!("jinja2 render failed: {e}")))
    }
}

type Registry = HashMap<&'static str, Arc<dyn Renderer>>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut m: Registry = HashMap::new();
    let plugins: Vec<Arc<dyn Renderer>> = vec![Arc::new(IdentityRenderer), Arc::new(Jinja2Renderer)];
    for p in plugins {
        m.insert(p.name(), p);
    }
    m
});

/// Resolve a renderer by its configured name. `None` maps to a 404 at the
/// API layer (§6 `/template/render`).
pub fn resolve(name: &str) -> Option<Arc<dyn Renderer>> {
    REGISTRY.get(name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_passes_through() {
        let r = resolve("identity").unwrap();
        assert_eq!(r.render("show version", None).unwrap(), "show version");
    }

    #[test]
    fn jinja2_substitutes_context() {
        let r = resolve("jinja2").unwrap();
        let mut ctx = serde_json::Map::new();
        ctx.insert("cmd".into(), serde_json::json!("show version"));
        assert_eq!(r.render("{{ cmd }}", Some(&ctx)).unwrap(), "show version");
    }

    #[test]
    fn unknown_renderer_resolves_to_none() {
        assert!(resolve("nonexistent").is_none());
    }
}
