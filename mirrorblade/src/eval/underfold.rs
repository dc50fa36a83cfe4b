//! Folding field: a set of named one-dimensional attractors ("creases").
//!
//! Evaluation applies enabled creases in ascending priority (name as the
//! tiebreak): `y <- y + gain * K(|y - pos| / radius) * (pos - y)`, where
//! the kernel `K` is 1 at the center and 0 at or beyond the radius.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use thiserror::Error;

/// Falloff kernel shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    #[default]
    Smooth,
    Cosine,
    Hermite,
}

impl Kernel {
    /// K(t) for t in [0, 1]; 1 at 0, 0 at 1.
    fn eval(self, t: f64) -> f64 {
        if t <= 0.0 {
            return 1.0;
        }
        if t >= 1.0 {
            return 0.0;
        }
        match self {
            Kernel::Linear => 1.0 - t,
            Kernel::Smooth => 1.0 - (3.0 * t * t - 2.0 * t * t * t),
            Kernel::Cosine => 0.5 * (1.0 + (std::f64::consts::PI * t).cos()),
            Kernel::Hermite => {
                let t3 = t * t * t;
                let t4 = t3 * t;
                let t5 = t4 * t;
                1.0 - (6.0 * t5 - 15.0 * t4 + 10.0 * t3)
            }
        }
    }

    /// dK/dt, zero outside (0, 1).
    fn eval_deriv(self, t: f64) -> f64 {
        if t <= 0.0 || t >= 1.0 {
            return 0.0;
        }
        match self {
            Kernel::Linear => -1.0,
            Kernel::Smooth => -(6.0 * t - 6.0 * t * t),
            Kernel::Cosine => {
                -0.5 * std::f64::consts::PI * (std::f64::consts::PI * t).sin()
            }
            Kernel::Hermite => {
                let t2 = t * t;
                let t3 = t2 * t;
                let t4 = t2 * t2;
                -(30.0 * t4 - 60.0 * t3 + 30.0 * t2)
            }
        }
    }
}

/// Named 1D attractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Crease {
    pub name: String,
    pub pos: f64,
    pub radius: f64,
    pub gain: f64,
    pub priority: i32,
    pub enabled: bool,
}

impl Default for Crease {
    fn default() -> Self {
        Self {
            name: String::new(),
            pos: 0.0,
            radius: 1.0,
            gain: 0.5,
            priority: 0,
            enabled: true,
        }
    }
}

/// Errors from JSON configuration.
#[derive(Debug, Error)]
pub enum UnderfoldError {
    #[error("configure payload must be an object")]
    NotAnObject,
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[derive(Debug, Default)]
struct Inner {
    creases: Vec<Crease>,
    kernel: Kernel,
}

/// The folding field. Owns its own exclusion; all methods are callable
/// from any thread.
#[derive(Debug, Default)]
pub struct Underfold {
    inner: Mutex<Inner>,
}

impl Underfold {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn set_kernel(&self, kernel: Kernel) {
        self.lock().kernel = kernel;
    }

    pub fn kernel(&self) -> Kernel {
        self.lock().kernel
    }

    pub fn clear(&self) {
        self.lock().creases.clear();
    }

    /// Inserts or replaces a crease by name. Rejects invalid names and
    /// non-positive radii.
    pub fn upsert(&self, crease: Crease) -> bool {
        if crease.radius <= 0.0 || !valid_name(&crease.name) {
            return false;
        }
        let mut inner = self.lock();
        match inner.creases.iter_mut().find(|c| c.name == crease.name) {
            Some(existing) => *existing = crease,
            None => inner.creases.push(crease),
        }
        true
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.lock();
        let before = inner.creases.len();
        inner.creases.retain(|c| c.name != name);
        inner.creases.len() != before
    }

    pub fn set_enabled(&self, name: &str, on: bool) -> bool {
        self.with_crease(name, |c| c.enabled = on)
    }

    pub fn set_priority(&self, name: &str, priority: i32) -> bool {
        self.with_crease(name, |c| c.priority = priority)
    }

    pub fn set_gain(&self, name: &str, gain: f64) -> bool {
        self.with_crease(name, |c| c.gain = gain)
    }

    pub fn set_radius(&self, name: &str, radius: f64) -> bool {
        if radius <= 0.0 {
            return false;
        }
        self.with_crease(name, |c| c.radius = radius)
    }

    pub fn set_position(&self, name: &str, pos: f64) -> bool {
        self.with_crease(name, |c| c.pos = pos)
    }

    fn with_crease(&self, name: &str, apply: impl FnOnce(&mut Crease)) -> bool {
        let mut inner = self.lock();
        match inner.creases.iter_mut().find(|c| c.name == name) {
            Some(crease) => {
                apply(crease);
                true
            }
            None => false,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lock().creases.iter().any(|c| c.name == name)
    }

    pub fn list(&self) -> Vec<Crease> {
        self.lock().creases.clone()
    }

    /// Snapshot of the creases in application order plus the kernel.
    fn ordered(&self) -> (Vec<Crease>, Kernel) {
        let inner = self.lock();
        let mut creases = inner.creases.clone();
        let kernel = inner.kernel;
        drop(inner);
        creases.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| a.name.cmp(&b.name))
        });
        (creases, kernel)
    }

    /// Applies every enabled crease to `x`. With no enabled creases this
    /// is the identity.
    pub fn evaluate(&self, x: f64) -> f64 {
        let (creases, kernel) = self.ordered();
        fold(&creases, kernel, x)
    }

    /// `evaluate(x) - x`.
    pub fn evaluate_delta(&self, x: f64) -> f64 {
        self.evaluate(x) - x
    }

    /// Analytic derivative dy/dx through the whole crease chain.
    pub fn evaluate_derivative(&self, x: f64) -> f64 {
        let (creases, kernel) = self.ordered();

        let mut y = x;
        let mut dydx = 1.0;
        for c in &creases {
            if !c.enabled || c.radius <= 0.0 {
                continue;
            }
            let d = (y - c.pos).abs();
            let t = d / c.radius;
            if t >= 1.0 {
                continue;
            }

            let u = c.pos - y;
            let k = kernel.eval(t);
            let kd = kernel.eval_deriv(t);

            // dt/dx = sign(y - pos)/radius * dy/dx; zero at the center.
            let sign = if d > 1e-12 {
                if y > c.pos {
                    1.0
                } else {
                    -1.0
                }
            } else {
                0.0
            };
            let dtdx = sign / c.radius * dydx;

            // y' = y + g*K*u with u = pos - y, du/dx = -dy/dx.
            dydx += c.gain * (kd * dtdx * u + k * (-dydx));
            y += c.gain * k * u;
        }
        dydx
    }

    /// Bulk evaluation with one snapshot for the whole batch.
    pub fn evaluate_many(&self, xs: &[f64]) -> Vec<f64> {
        let (creases, kernel) = self.ordered();
        xs.iter().map(|x| fold(&creases, kernel, *x)).collect()
    }

    /// Applies a JSON document: optional `kernel`, optional `replace`
    /// flag, and a `creases` array of crease objects. Entries with bad
    /// names or non-positive radii are skipped.
    pub fn configure_from_json(&self, doc: &serde_json::Value) -> Result<(), UnderfoldError> {
        let obj = doc.as_object().ok_or(UnderfoldError::NotAnObject)?;

        let replace = obj
            .get("replace")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let kernel = obj
            .get("kernel")
            .and_then(|v| serde_json::from_value::<Kernel>(v.clone()).ok());

        let mut incoming = Vec::new();
        if let Some(entries) = obj.get("creases").and_then(|v| v.as_array()) {
            for entry in entries {
                if let Ok(crease) = serde_json::from_value::<Crease>(entry.clone()) {
                    if valid_name(&crease.name) && crease.radius > 0.0 {
                        incoming.push(crease);
                    }
                }
            }
        }

        let mut inner = self.lock();
        if replace {
            inner.creases.clear();
        }
        for crease in incoming {
            match inner.creases.iter_mut().find(|c| c.name == crease.name) {
                Some(existing) => *existing = crease,
                None => inner.creases.push(crease),
            }
        }
        if let Some(kernel) = kernel {
            inner.kernel = kernel;
        }
        Ok(())
    }

    pub fn snapshot_json(&self) -> serde_json::Value {
        let inner = self.lock();
        serde_json::json!({
            "kernel": inner.kernel,
            "creases": inner.creases,
        })
    }
}

fn fold(creases: &[Crease], kernel: Kernel, x: f64) -> f64 {
    let mut y = x;
    for c in creases {
        if !c.enabled || c.radius <= 0.0 {
            continue;
        }
        let t = (y - c.pos).abs() / c.radius;
        if t >= 1.0 {
            continue;
        }
        y += c.gain * kernel.eval(t) * (c.pos - y);
    }
    y
}
