//! Figure-8 curves: a 1:2 Lissajous and the Bernoulli lemniscate, as
//! pure functions plus a small advancing oscillator with exponential
//! smoothing.

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use std::sync::Mutex;

/// Lissajous point at parameter `t`:
/// `(ax * sin(nx * 2πt + phase), ay * sin(ny * 2πt))`.
pub fn lissajous(t: f64, ax: f64, ay: f64, nx: f64, ny: f64, phase: f64) -> (f64, f64) {
    let x = ax * (nx * TAU * t + phase).sin();
    let y = ay * (ny * TAU * t).sin();
    (x, y)
}

/// The 1:2 frequency-ratio Lissajous (the classic figure 8).
pub fn lissajous12(t: f64, ax: f64, ay: f64, phase: f64) -> (f64, f64) {
    lissajous(t, ax, ay, 1.0, 2.0, phase)
}

/// Bernoulli lemniscate point at parameter `t`:
/// `x = A cos θ / (1 + sin²θ)`, `y = A sin θ cos θ / (1 + sin²θ)`,
/// with `θ = 2πt`.
pub fn bernoulli(t: f64, a: f64) -> (f64, f64) {
    let theta = TAU * t;
    let s = theta.sin();
    let c = theta.cos();
    let denom = 1.0 + s * s;
    let inv = if denom > f64::EPSILON { 1.0 / denom } else { 0.0 };
    (a * c * inv, a * s * c * inv)
}

/// Which curve an oscillator traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Figure8Shape {
    #[default]
    Lissajous12,
    Bernoulli,
}

/// Oscillator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Figure8Params {
    pub shape: Figure8Shape,
    pub amplitude_x: f64,
    pub amplitude_y: f64,
    /// Loop frequency in Hz; clamped non-negative.
    pub speed_hz: f64,
    pub phase: f64,
    pub center_x: f64,
    pub center_y: f64,
    /// Exponential smoothing factor in [0, 1]; 1 disables smoothing.
    pub smoothing_alpha: f64,
}

impl Default for Figure8Params {
    fn default() -> Self {
        Self {
            shape: Figure8Shape::Lissajous12,
            amplitude_x: 0.5,
            amplitude_y: 0.5,
            speed_hz: 0.33,
            phase: 0.0,
            center_x: 0.0,
            center_y: 0.0,
            smoothing_alpha: 1.0,
        }
    }
}

impl Figure8Params {
    fn normalized(mut self) -> Self {
        self.speed_hz = self.speed_hz.max(0.0);
        self.smoothing_alpha = self.smoothing_alpha.clamp(0.0, 1.0);
        self
    }
}

#[derive(Debug, Default)]
struct Inner {
    params: Figure8Params,
    time_sec: f64,
    last: (f64, f64),
    have_history: bool,
}

/// Advancing, exponentially smoothed curve sampler.
#[derive(Debug)]
pub struct Figure8 {
    inner: Mutex<Inner>,
}

impl Default for Figure8 {
    fn default() -> Self {
        Self::new(Figure8Params::default())
    }
}

impl Figure8 {
    pub fn new(params: Figure8Params) -> Self {
        Self {
            inner: Mutex::new(Inner {
                params: params.normalized(),
                ..Default::default()
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_params(&self, params: Figure8Params) {
        let mut inner = self.lock();
        inner.params = params.normalized();
        // Parameter jumps restart smoothing rather than gliding from the
        // old curve.
        inner.have_history = false;
    }

    pub fn params(&self) -> Figure8Params {
        self.lock().params
    }

    /// Merges recognized fields from a JSON object onto the current
    /// params (restarting smoothing, as any parameter change does).
    pub fn configure_from_json(&self, doc: &serde_json::Value) {
        let Some(patch) = doc.as_object() else {
            return;
        };
        let current = self.params();
        let mut merged = serde_json::to_value(current).unwrap_or_default();
        if let Some(target) = merged.as_object_mut() {
            for (k, v) in patch {
                if target.contains_key(k) {
                    target.insert(k.clone(), v.clone());
                }
            }
        }
        if let Ok(params) = serde_json::from_value::<Figure8Params>(merged) {
            self.set_params(params);
        }
    }

    pub fn reset(&self, time_sec: f64) {
        let mut inner = self.lock();
        inner.time_sec = time_sec;
        inner.have_history = false;
        inner.last = (0.0, 0.0);
    }

    /// Advances internal time by `dt` and returns the smoothed point.
    pub fn advance(&self, dt: f64) -> (f64, f64) {
        let mut inner = self.lock();
        inner.time_sec += dt.max(0.0);

        let raw = sample(&inner.params, inner.time_sec);
        let alpha = inner.params.smoothing_alpha;
        if !inner.have_history {
            inner.last = raw;
            inner.have_history = true;
        } else {
            inner.last = (
                alpha * raw.0 + (1.0 - alpha) * inner.last.0,
                alpha * raw.1 + (1.0 - alpha) * inner.last.1,
            );
        }
        inner.last
    }

    /// Unsmoothed sample at an absolute time.
    pub fn sample_at(&self, time_sec: f64) -> (f64, f64) {
        let inner = self.lock();
        sample(&inner.params, time_sec)
    }

    /// Last smoothed point without advancing.
    pub fn current(&self) -> (f64, f64) {
        self.lock().last
    }
}

fn sample(params: &Figure8Params, time_sec: f64) -> (f64, f64) {
    let t = time_sec * params.speed_hz;
    let (x, y) = match params.shape {
        Figure8Shape::Lissajous12 => {
            lissajous12(t, params.amplitude_x, params.amplitude_y, params.phase)
        }
        Figure8Shape::Bernoulli => {
            let scale = (params.amplitude_x + params.amplitude_y) * 0.5;
            bernoulli(t, scale)
        }
    };
    (x + params.center_x, y + params.center_y)
}
