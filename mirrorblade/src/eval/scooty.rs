//! Bounded ring of numeric samples with trailing-window statistics.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 512;

/// Aggregate statistics over the ring contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScootyStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub stddev: f64,
}

/// Fixed-capacity sample ring; the oldest sample is evicted on overflow.
#[derive(Debug)]
pub struct ScootyRing {
    inner: Mutex<VecDeque<f64>>,
    capacity: usize,
}

impl Default for ScootyRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ScootyRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<f64>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends one sample.
    pub fn bump(&self, value: f64) {
        let mut ring = self.lock();
        if ring.len() == self.capacity {
            ring.pop_front();
        }
        ring.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The trailing `max` samples, oldest first.
    pub fn samples(&self, max: usize) -> Vec<f64> {
        let ring = self.lock();
        let n = max.min(ring.len());
        ring.iter().skip(ring.len() - n).copied().collect()
    }

    /// Min/max/mean/stddev over the whole ring. Zeroed when empty.
    pub fn stats(&self) -> ScootyStats {
        let samples = self.samples(self.capacity);
        if samples.is_empty() {
            return ScootyStats::default();
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &x in &samples {
            min = min.min(x);
            max = max.max(x);
            sum += x;
        }
        let mean = sum / samples.len() as f64;

        let mut acc = 0.0;
        for &x in &samples {
            let d = x - mean;
            acc += d * d;
        }
        let stddev = (acc / samples.len() as f64).sqrt();

        ScootyStats {
            count: samples.len(),
            min,
            max,
            mean,
            stddev,
        }
    }
}

/// Renders samples as a bordered text block for terminal clients.
pub fn format_samples(samples: &[f64], title: &str) -> String {
    let body: Vec<String> = samples.iter().map(|v| format!("{v:>12.4}")).collect();
    let width = body
        .iter()
        .map(|s| s.len())
        .chain(std::iter::once(title.len()))
        .max()
        .unwrap_or(8)
        + 2;

    let mut out = String::new();
    out.push('+');
    out.push_str(&"-".repeat(width));
    out.push_str("+\n");
    out.push_str(&format!("| {:<w$}|\n", title, w = width - 1));
    out.push('+');
    out.push_str(&"-".repeat(width));
    out.push_str("+\n");
    for line in &body {
        out.push_str(&format!("| {:<w$}|\n", line, w = width - 1));
    }
    out.push('+');
    out.push_str(&"-".repeat(width));
    out.push_str("+\n");
    out
}
