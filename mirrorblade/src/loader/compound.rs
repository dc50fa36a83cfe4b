//! Compound entities: named values computed from expressions.
//!
//! The `compound.entities` array resolves in declaration order, and each
//! computed entity is exposed under its own name to every later
//! equation, so documents can chain definitions.

use super::{LoaderContext, LoaderService};
use crate::eval::expr;
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    staged: BTreeMap<String, f64>,
    live: BTreeMap<String, f64>,
}

/// Expression-driven value table with a staged/live split: `configure`
/// stages, `apply` commits.
#[derive(Debug, Default)]
pub struct CompoundService {
    inner: Mutex<Inner>,
}

impl CompoundService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Committed value of one entity.
    pub fn get(&self, entity: &str) -> Option<f64> {
        self.lock().live.get(entity).copied()
    }

    /// All committed values.
    pub fn values(&self) -> BTreeMap<String, f64> {
        self.lock().live.clone()
    }
}

impl LoaderService for CompoundService {
    fn name(&self) -> &'static str {
        "compound"
    }

    fn configure(&self, cfg: &serde_json::Value, ctx: &LoaderContext<'_>) {
        let mut staged = BTreeMap::new();

        // Chain environment: base numerics first, then each resolved
        // entity in order.
        let mut chain = ctx.numeric_env();

        if let Some(entities) = cfg
            .get("compound")
            .and_then(|c| c.get("entities"))
            .and_then(|e| e.as_array())
        {
            for entry in entities {
                let Some(name) = entry.get("name").and_then(|n| n.as_str()) else {
                    continue;
                };
                let Some(equation) = entry.get("equation").and_then(|e| e.as_str()) else {
                    continue;
                };
                if name.is_empty() || equation.is_empty() {
                    continue;
                }

                let mut env = chain.clone();
                if let Some(extra) = entry.get("env") {
                    for (k, v) in expr::env_from_json(extra) {
                        env.insert(k, v);
                    }
                }

                match expr::eval(equation, &env) {
                    Ok(value) => {
                        staged.insert(name.to_string(), value);
                        chain.insert(name.to_string(), value);
                    }
                    Err(e) => {
                        warn!(entity = name, error = %e, "Compound entity failed to resolve");
                    }
                }
            }
        }

        self.lock().staged = staged;
    }

    fn apply(&self) {
        let mut inner = self.lock();
        inner.live = inner.staged.clone();
    }

    fn snapshot(&self) -> serde_json::Value {
        let inner = self.lock();
        serde_json::to_value(&inner.live).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn reset(&self) {
        let mut inner = self.lock();
        inner.staged.clear();
        inner.live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with<'a>(env: &'a serde_json::Value) -> LoaderContext<'a> {
        LoaderContext { base_env: env }
    }

    #[test]
    fn test_entities_chain_in_declaration_order() {
        let svc = CompoundService::new();
        let cfg = serde_json::json!({
            "compound": {"entities": [
                {"name": "a", "equation": "2+3"},
                {"name": "b", "equation": "a*4"},
            ]}
        });
        let env = serde_json::json!({});
        svc.configure(&cfg, &ctx_with(&env));
        svc.apply();

        assert_eq!(svc.get("a"), Some(5.0));
        assert_eq!(svc.get("b"), Some(20.0));
    }

    #[test]
    fn test_base_env_feeds_equations() {
        let svc = CompoundService::new();
        let cfg = serde_json::json!({
            "compound": {"entities": [{"name": "scaled", "equation": "base * 3"}]}
        });
        let env = serde_json::json!({"base": 2.0});
        svc.configure(&cfg, &ctx_with(&env));
        svc.apply();
        assert_eq!(svc.get("scaled"), Some(6.0));
    }

    #[test]
    fn test_entity_env_overrides_base() {
        let svc = CompoundService::new();
        let cfg = serde_json::json!({
            "compound": {"entities": [
                {"name": "v", "equation": "x", "env": {"x": 9.0}},
            ]}
        });
        let env = serde_json::json!({"x": 1.0});
        svc.configure(&cfg, &ctx_with(&env));
        svc.apply();
        assert_eq!(svc.get("v"), Some(9.0));
    }

    #[test]
    fn test_failed_entity_is_skipped_but_rest_resolve() {
        let svc = CompoundService::new();
        let cfg = serde_json::json!({
            "compound": {"entities": [
                {"name": "bad", "equation": "missing_var + 1"},
                {"name": "good", "equation": "7"},
            ]}
        });
        let env = serde_json::json!({});
        svc.configure(&cfg, &ctx_with(&env));
        svc.apply();
        assert_eq!(svc.get("bad"), None);
        assert_eq!(svc.get("good"), Some(7.0));
    }

    #[test]
    fn test_values_not_visible_until_apply() {
        let svc = CompoundService::new();
        let cfg = serde_json::json!({
            "compound": {"entities": [{"name": "a", "equation": "1"}]}
        });
        let env = serde_json::json!({});
        svc.configure(&cfg, &ctx_with(&env));
        assert_eq!(svc.get("a"), None);
        svc.apply();
        assert_eq!(svc.get("a"), Some(1.0));
    }

    #[test]
    fn test_reset_clears_everything() {
        let svc = CompoundService::new();
        let cfg = serde_json::json!({
            "compound": {"entities": [{"name": "a", "equation": "1"}]}
        });
        let env = serde_json::json!({});
        svc.configure(&cfg, &ctx_with(&env));
        svc.apply();
        svc.reset();
        assert_eq!(svc.get("a"), None);
        assert_eq!(svc.snapshot(), serde_json::json!({}));
    }
}
