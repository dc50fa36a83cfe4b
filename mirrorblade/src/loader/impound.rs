//! Impound service: a deny-list of literal names and glob rules.
//!
//! A name is impounded when it matches a literal entry exactly or any
//! rule pattern. Patterns support `*` (any span, including empty) and
//! `?` (exactly one character).

use super::{LoaderContext, LoaderService};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One glob rule with an optional tag for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpoundRule {
    #[serde(default)]
    pub tag: String,
    #[serde(rename = "match")]
    pub pattern: String,
}

/// Iterative glob matcher with `*` backtracking.
pub fn glob_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let mut ti = 0;
    let mut pi = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            ti += 1;
            pi += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star = Some(pi);
            pi += 1;
            mark = ti;
        } else if let Some(star_pos) = star {
            pi = star_pos + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }
    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }
    pi == pattern.len()
}

#[derive(Debug, Default)]
struct Inner {
    staged_items: Vec<String>,
    staged_rules: Vec<ImpoundRule>,
    items: Vec<String>,
    rules: Vec<ImpoundRule>,
}

/// Staged/live deny-list.
#[derive(Debug, Default)]
pub struct ImpoundService {
    inner: Mutex<Inner>,
}

impl ImpoundService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// True when `name` matches a literal item or any committed rule.
    pub fn is_impounded(&self, name: &str) -> bool {
        let inner = self.lock();
        inner.items.iter().any(|item| item == name)
            || inner.rules.iter().any(|r| glob_match(name, &r.pattern))
    }
}

impl LoaderService for ImpoundService {
    fn name(&self) -> &'static str {
        "impound"
    }

    fn configure(&self, cfg: &serde_json::Value, _ctx: &LoaderContext<'_>) {
        let mut staged_items = Vec::new();
        let mut staged_rules = Vec::new();

        if let Some(section) = cfg.get("impound").and_then(|s| s.as_object()) {
            if let Some(items) = section.get("items").and_then(|i| i.as_array()) {
                for item in items {
                    if let Some(s) = item.as_str() {
                        staged_items.push(s.to_string());
                    }
                }
            }
            if let Some(rules) = section.get("rules").and_then(|r| r.as_array()) {
                for rule in rules {
                    if let Ok(rule) = serde_json::from_value::<ImpoundRule>(rule.clone()) {
                        if !rule.pattern.is_empty() {
                            staged_rules.push(rule);
                        }
                    }
                }
            }
        }

        let mut inner = self.lock();
        inner.staged_items = staged_items;
        inner.staged_rules = staged_rules;
    }

    fn apply(&self) {
        let mut inner = self.lock();
        inner.items = inner.staged_items.clone();
        inner.rules = inner.staged_rules.clone();
    }

    fn snapshot(&self) -> serde_json::Value {
        let inner = self.lock();
        serde_json::json!({
            "items": inner.items,
            "rules": inner.rules,
        })
    }

    fn reset(&self) {
        let mut inner = self.lock();
        *inner = Inner::default();
    }
}
