//! Recovery smoother: a one-dimensional spring-damper with a hysteresis
//! band, jump-triggered cooldown, optional output clamp, and a velocity
//! cap.
//!
//! Two hard invariants: with `enabled = false` the output equals the
//! input, and with `abide_emptiness = true` the output and velocity are
//! zero regardless of input.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Tuning parameters. Serialized in the wire's camelCase form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterfoldParams {
    pub enabled: bool,
    /// Forces output (and velocity) to zero while set.
    pub abide_emptiness: bool,
    pub stiffness: f64,
    pub damping: f64,
    /// Error band inside which the response linearly fades to nothing.
    pub hysteresis_band: f64,
    /// Input jumps beyond this magnitude trigger a cooldown.
    pub jump_threshold: f64,
    pub cooldown_seconds: f64,
    /// Stiffness multiplier while cooling down.
    pub cooldown_gain: f64,
    pub clamp_enabled: bool,
    pub clamp_min: f64,
    pub clamp_max: f64,
    /// Whether the first observed sample snaps the output to the input.
    pub snap_first_sample: bool,
    pub max_velocity: f64,
}

impl Default for InterfoldParams {
    fn default() -> Self {
        Self {
            enabled: true,
            abide_emptiness: false,
            stiffness: 12.0,
            damping: 6.0,
            hysteresis_band: 0.0,
            // Effectively "never" while staying JSON-representable.
            jump_threshold: 1.0e12,
            cooldown_seconds: 0.0,
            cooldown_gain: 0.25,
            clamp_enabled: false,
            clamp_min: 0.0,
            clamp_max: 1.0,
            snap_first_sample: true,
            max_velocity: 1.0e6,
        }
    }
}

impl InterfoldParams {
    fn normalized(mut self) -> Self {
        if self.clamp_enabled && self.clamp_min > self.clamp_max {
            std::mem::swap(&mut self.clamp_min, &mut self.clamp_max);
        }
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct State {
    y: f64,
    v: f64,
    cooldown: f64,
    seeded: bool,
}

/// Filter state snapshot for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfoldSnapshot {
    pub output: f64,
    pub velocity: f64,
    pub cooldown_remaining: f64,
    pub seeded: bool,
}

#[derive(Debug, Default)]
struct Inner {
    params: InterfoldParams,
    state: State,
}

/// The smoother. Owns its own exclusion.
#[derive(Debug)]
pub struct Interfold {
    inner: Mutex<Inner>,
}

impl Default for Interfold {
    fn default() -> Self {
        Self::new(InterfoldParams::default())
    }
}

impl Interfold {
    pub fn new(params: InterfoldParams) -> Self {
        Self {
            inner: Mutex::new(Inner {
                params: params.normalized(),
                state: State::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_params(&self, params: InterfoldParams) {
        self.lock().params = params.normalized();
    }

    pub fn params(&self) -> InterfoldParams {
        self.lock().params
    }

    /// Merges recognized fields from a JSON object onto the current
    /// params. Unknown fields are ignored.
    pub fn configure_from_json(&self, doc: &serde_json::Value) {
        let Some(obj) = doc.as_object() else {
            return;
        };
        let mut inner = self.lock();
        let mut merged = serde_json::to_value(inner.params).unwrap_or_default();
        if let Some(target) = merged.as_object_mut() {
            for (k, v) in obj {
                if target.contains_key(k) {
                    target.insert(k.clone(), v.clone());
                }
            }
        }
        if let Ok(params) = serde_json::from_value::<InterfoldParams>(merged) {
            inner.params = params.normalized();
        }
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        let inner = self.lock();
        let mut doc = serde_json::to_value(inner.params).unwrap_or_default();
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(
                "state".to_string(),
                serde_json::to_value(InterfoldSnapshot {
                    output: inner.state.y,
                    velocity: inner.state.v,
                    cooldown_remaining: inner.state.cooldown,
                    seeded: inner.state.seeded,
                })
                .unwrap_or_default(),
            );
        }
        doc
    }

    pub fn snapshot(&self) -> InterfoldSnapshot {
        let inner = self.lock();
        InterfoldSnapshot {
            output: inner.state.y,
            velocity: inner.state.v,
            cooldown_remaining: inner.state.cooldown,
            seeded: inner.state.seeded,
        }
    }

    /// Advances the filter by `dt` toward input `x` and returns the new
    /// output.
    pub fn step(&self, dt: f64, x: f64) -> f64 {
        let mut inner = self.lock();
        let params = inner.params;

        if !params.enabled {
            inner.state = State {
                y: x,
                v: 0.0,
                cooldown: 0.0,
                seeded: true,
            };
            return x;
        }

        if params.abide_emptiness {
            inner.state = State {
                y: 0.0,
                v: 0.0,
                cooldown: 0.0,
                seeded: true,
            };
            return 0.0;
        }

        if !inner.state.seeded {
            inner.state.seeded = true;
            if params.snap_first_sample {
                inner.state.y = x;
                inner.state.v = 0.0;
                inner.state.cooldown = 0.0;
                return x;
            }
            inner.state.y = 0.0;
            inner.state.v = 0.0;
            inner.state.cooldown = 0.0;
        }

        trigger_cooldown(&mut inner.state, &params, x);
        integrate(&mut inner.state, &params, dt, x);
        inner.state.y
    }

    /// Simulates one step without mutating the live state.
    pub fn peek_next(&self, dt: f64, x: f64) -> f64 {
        let inner = self.lock();
        let params = inner.params;

        if !params.enabled {
            return x;
        }
        if params.abide_emptiness {
            return 0.0;
        }

        let mut sim = inner.state;
        drop(inner);

        if !sim.seeded {
            if params.snap_first_sample {
                return x;
            }
            sim = State {
                seeded: true,
                ..State::default()
            };
        }

        trigger_cooldown(&mut sim, &params, x);
        integrate(&mut sim, &params, dt, x);
        sim.y
    }

    /// Clears all state; the next sample reseeds.
    pub fn reset(&self) {
        self.lock().state = State::default();
    }

    /// Clears state and pins the output to `value`.
    pub fn hard_reset(&self, value: f64) {
        self.lock().state = State {
            y: value,
            seeded: true,
            ..State::default()
        };
    }

    /// Extends the cooldown window to at least `seconds`.
    pub fn begin_cooldown(&self, seconds: f64) {
        let mut inner = self.lock();
        inner.state.cooldown = inner.state.cooldown.max(seconds.max(0.0));
    }
}

fn trigger_cooldown(state: &mut State, params: &InterfoldParams, x: f64) {
    if (x - state.y).abs() > params.jump_threshold {
        state.cooldown = state.cooldown.max(params.cooldown_seconds);
    }
}

fn integrate(state: &mut State, params: &InterfoldParams, dt: f64, x: f64) {
    if dt <= 0.0 {
        return;
    }

    let mut stiffness = params.stiffness;
    if state.cooldown > 0.0 {
        stiffness *= params.cooldown_gain.max(0.0);
        state.cooldown = (state.cooldown - dt).max(0.0);
    }

    // Inside the hysteresis band the response fades linearly to zero.
    let e = x - state.y;
    let band = params.hysteresis_band;
    let band_scale = if e.abs() < band && band > 1e-12 {
        e.abs() / band
    } else {
        1.0
    };

    let accel = stiffness * e * band_scale - params.damping * state.v;
    state.v += accel * dt;

    let vmax = params.max_velocity.max(1e-6);
    state.v = state.v.clamp(-vmax, vmax);

    state.y += state.v * dt;

    if params.clamp_enabled {
        state.y = state.y.clamp(params.clamp_min, params.clamp_max);
        // Pinned at a bound, velocity must not keep pushing outward.
        if state.y <= params.clamp_min + 1e-6 {
            state.v = state.v.min(0.0);
        }
        if state.y >= params.clamp_max - 1e-6 {
            state.v = state.v.max(0.0);
        }
    }
}
