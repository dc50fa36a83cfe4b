//! Volumetric-phi service: typed render parameters with a staged/live
//! split. `configure` stages, `apply` commits, `get` reads the live set.

use super::{LoaderContext, LoaderService};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Volumetric parameters. Clamped on ingest: multipliers and strength
/// are non-negative, fades and blends sit in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolPhiParams {
    pub enabled: bool,
    pub distance_mul: f64,
    pub density_mul: f64,
    pub horizon_fade: f64,
    pub jitter_strength: f64,
    pub temporal_blend: f64,
}

impl Default for VolPhiParams {
    fn default() -> Self {
        Self {
            enabled: true,
            distance_mul: 1.0,
            density_mul: 1.0,
            horizon_fade: 0.25,
            jitter_strength: 1.0,
            temporal_blend: 0.90,
        }
    }
}

impl VolPhiParams {
    fn normalized(mut self) -> Self {
        self.distance_mul = self.distance_mul.max(0.0);
        self.density_mul = self.density_mul.max(0.0);
        self.horizon_fade = self.horizon_fade.clamp(0.0, 1.0);
        self.jitter_strength = self.jitter_strength.max(0.0);
        self.temporal_blend = self.temporal_blend.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    staged: VolPhiParams,
    live: VolPhiParams,
}

/// Staged/live volumetric parameter holder.
#[derive(Debug, Default)]
pub struct VolPhiService {
    inner: Mutex<Inner>,
}

impl VolPhiService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Live parameter snapshot.
    pub fn get(&self) -> VolPhiParams {
        self.lock().live
    }

    /// Merges recognized fields onto the live set and commits them
    /// immediately. Used by the direct `volphi.set` operation; document
    /// loads go through configure/apply instead.
    pub fn set_from_json(&self, doc: &serde_json::Value) -> VolPhiParams {
        let mut inner = self.lock();
        let mut merged = serde_json::to_value(inner.live).unwrap_or_default();
        if let (Some(target), Some(patch)) = (merged.as_object_mut(), doc.as_object()) {
            for (k, v) in patch {
                if target.contains_key(k) {
                    target.insert(k.clone(), v.clone());
                }
            }
        }
        if let Ok(params) = serde_json::from_value::<VolPhiParams>(merged) {
            let params = params.normalized();
            inner.live = params;
            inner.staged = params;
        }
        inner.live
    }
}

impl LoaderService for VolPhiService {
    fn name(&self) -> &'static str {
        "volumetricPhi"
    }

    fn configure(&self, cfg: &serde_json::Value, _ctx: &LoaderContext<'_>) {
        let staged = match cfg.get("volumetricPhi") {
            Some(section) if section.is_object() => {
                serde_json::from_value::<VolPhiParams>(section.clone())
                    .unwrap_or_default()
                    .normalized()
            }
            _ => VolPhiParams::default(),
        };
        self.lock().staged = staged;
    }

    fn apply(&self) {
        let mut inner = self.lock();
        inner.live = inner.staged;
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self.lock().live).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn reset(&self) {
        let mut inner = self.lock();
        *inner = Inner::default();
    }
}
