//! Volumetric jitter from the Halton(2,3) low-discrepancy sequence.
//!
//! The sequence is deterministic: the same frame index always yields the
//! same jitter pair. Indices are offset by one so index 0 is never the
//! degenerate (0, 0) sample.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Radical-inverse Halton sample for `index` in the given base.
pub fn halton(mut index: u32, base: u32) -> f64 {
    let mut f = 1.0;
    let mut r = 0.0;
    while index > 0 {
        f /= base as f64;
        r += f * (index % base) as f64;
        index /= base;
    }
    r
}

/// Paired Halton(2,3) sample, offset to avoid (0, 0) at index 0.
pub fn halton23(index: u32) -> (f64, f64) {
    let k = index.wrapping_add(1);
    (halton(k, 2), halton(k, 3))
}

/// Jitter parameters. All numeric fields are clamped on ingest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JitterParams {
    pub enabled: bool,
    pub distance_mul: f64,
    pub density_mul: f64,
    pub horizon_fade: f64,
    pub jitter_strength: f64,
    pub temporal_blend: f64,
}

impl Default for JitterParams {
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

impl JitterParams {
    fn normalized(mut self) -> Self {
        self.distance_mul = self.distance_mul.max(0.0);
        self.density_mul = self.density_mul.max(0.0);
        self.horizon_fade = self.horizon_fade.clamp(0.0, 1.0);
        self.jitter_strength = self.jitter_strength.max(0.0);
        self.temporal_blend = self.temporal_blend.clamp(0.0, 1.0);
        self
    }
}

/// Advancing state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JitterState {
    pub time_sec: f64,
    pub frame: u32,
    pub jitter_x: f64,
    pub jitter_y: f64,
}

#[derive(Debug, Default)]
struct Inner {
    params: JitterParams,
    state: JitterState,
}

/// The jitter source. Owns its own exclusion.
#[derive(Debug)]
pub struct Infinitizer {
    inner: Mutex<Inner>,
}

impl Default for Infinitizer {
    fn default() -> Self {
        Self::new(JitterParams::default())
    }
}

impl Infinitizer {
    pub fn new(params: JitterParams) -> Self {
        Self {
            inner: Mutex::new(Inner {
                params: params.normalized(),
                state: JitterState::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_params(&self, params: JitterParams) {
        self.lock().params = params.normalized();
    }

    pub fn params(&self) -> JitterParams {
        self.lock().params
    }

    /// Merges recognized fields from a JSON object onto the current
    /// params; unknown fields are ignored, clamps still apply.
    pub fn configure_from_json(&self, doc: &serde_json::Value) {
        let Some(patch) = doc.as_object() else {
            return;
        };
        let mut inner = self.lock();
        let mut merged = serde_json::to_value(inner.params).unwrap_or_default();
        if let Some(target) = merged.as_object_mut() {
            for (k, v) in patch {
                if target.contains_key(k) {
                    target.insert(k.clone(), v.clone());
                }
            }
        }
        if let Ok(params) = serde_json::from_value::<JitterParams>(merged) {
            inner.params = params.normalized();
        }
    }

    pub fn reset(&self, time_sec: f64) {
        self.lock().state = JitterState {
            time_sec: time_sec.max(0.0),
            ..Default::default()
        };
    }

    /// Advances by one frame: time accumulates, the Halton index steps by
    /// one, and the centered jitter pair is recomputed.
    pub fn advance(&self, dt_sec: f64) {
        let mut inner = self.lock();
        inner.state.time_sec += dt_sec.max(0.0);
        inner.state.frame = inner.state.frame.wrapping_add(1);

        let (hx, hy) = halton23(inner.state.frame);
        inner.state.jitter_x = (hx - 0.5) * inner.params.jitter_strength;
        inner.state.jitter_y = (hy - 0.5) * inner.params.jitter_strength;
    }

    pub fn state(&self) -> JitterState {
        self.lock().state
    }

    /// Current centered jitter pair, in [-0.5, 0.5] x strength.
    pub fn current_jitter(&self) -> (f64, f64) {
        let state = self.lock().state;
        (state.jitter_x, state.jitter_y)
    }
}
