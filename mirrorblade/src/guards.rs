//! Per-feature enable flags with auto-disable on repeated failure.
//!
//! Features are created lazily on first reference (enabled, threshold
//! 3). A guarded run that fails increments the failure counter; hitting
//! the threshold flips the feature off until something re-enables it,
//! which also resets the counter.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Failures tolerated before a feature is disabled.
pub const DEFAULT_FAIL_THRESHOLD: u32 = 3;

#[derive(Debug)]
struct FeatureState {
    enabled: AtomicBool,
    failures: AtomicU32,
    threshold: u32,
}

impl FeatureState {
    fn new(threshold: u32) -> Self {
        Self {
            enabled: AtomicBool::new(true),
            failures: AtomicU32::new(0),
            threshold: threshold.max(1),
        }
    }
}

/// Serializable view of one feature, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureSnapshot {
    pub name: String,
    pub enabled: bool,
    pub failures: u32,
    pub threshold: u32,
}

/// Registry of named feature guards.
#[derive(Debug, Default)]
pub struct FeatureGuards {
    map: DashMap<String, Arc<FeatureState>>,
}

impl FeatureGuards {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&self, name: &str) -> Arc<FeatureState> {
        self.map
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(FeatureState::new(DEFAULT_FAIL_THRESHOLD)))
            .clone()
    }

    /// Unknown features default to enabled without being created.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.map
            .get(name)
            .map(|state| state.enabled.load(Ordering::Acquire))
            .unwrap_or(true)
    }

    /// Flips a feature. Enabling resets the failure counter.
    pub fn set_enabled(&self, name: &str, on: bool) {
        let state = self.get_or_create(name);
        state.enabled.store(on, Ordering::Release);
        if on {
            state.failures.store(0, Ordering::Release);
        }
    }

    pub fn failures(&self, name: &str) -> u32 {
        self.map
            .get(name)
            .map(|state| state.failures.load(Ordering::Acquire))
            .unwrap_or(0)
    }

    /// Records one failure; disables the feature at the threshold.
    pub fn record_failure(&self, name: &str) {
        let state = self.get_or_create(name);
        let failures = state.failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= state.threshold {
            state.enabled.store(false, Ordering::Release);
            warn!(feature = name, failures, "Feature auto-disabled");
        }
    }

    /// Runs `f` if the feature is enabled. The closure executes outside
    /// any registry exclusion; an `Err` outcome counts as a failure.
    ///
    /// Returns `None` when the feature is disabled.
    pub fn guarded_run<T, E>(
        &self,
        name: &str,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Option<Result<T, E>> {
        let state = self.get_or_create(name);
        if !state.enabled.load(Ordering::Acquire) {
            return None;
        }

        let outcome = f();
        if outcome.is_err() {
            self.record_failure(name);
        }
        Some(outcome)
    }

    /// All known features, sorted by name.
    pub fn snapshot(&self) -> Vec<FeatureSnapshot> {
        let mut out: Vec<FeatureSnapshot> = self
            .map
            .iter()
            .map(|entry| FeatureSnapshot {
                name: entry.key().clone(),
                enabled: entry.value().enabled.load(Ordering::Acquire),
                failures: entry.value().failures.load(Ordering::Acquire),
                threshold: entry.value().threshold,
            })
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_else(|_| serde_json::json!([]))
    }
}
