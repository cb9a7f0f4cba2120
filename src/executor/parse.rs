//! Named parser plugins (§4.7 step 5). TextFSM/TTP parsing is out of
//! scope (§1); this crate ships only the identity parser exercised by the
//! render -> parse round-trip law (§8 law 8).

use crate::error::Result;
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Parser: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parse a single command's raw `output` value, optionally guided by
    /// `template` (a parser-specific grammar/template source).
    fn parse(&self, template: Option<&str>, output: &Value) -> Result<Value>;
}

/// Returns `output` unchanged, so `parsed == output` for any payload.
pub struct IdentityParser;

impl Parser for IdentityParser {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn parse(&self, _template: Option<&str>, output: &Value) -> Result<Value> {
        Ok(output.clone())
    }
}

type Registry = HashMap<&'static str, Arc<dyn Parser>>;

static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut m: Registry = HashMap::new();
    let plugins: Vec<Arc<dyn Parser>> = vec![Arc::new(IdentityParser)];
    for p in plugins {
        m.insert(p.name(), p);
    }
    m
});

/// Resolve a parser by its configured name. `None` maps to a 404 at the
/// API layer (§6 `/template/parse`).
pub fn resolve(name: &str) -> Option<Arc<dyn Parser>> {
    REGISTRY.get(name).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_any_value() {
        let p = resolve("identity").unwrap();
        let v = serde_json::json!({"a": 1});
        assert_eq!(p.parse(None, &v).unwrap(), v);
    }

    #[test]
    fn unknown_parser_resolves_to_none() {
        assert!(resolve("nonexistent").is_none());
    }
}
