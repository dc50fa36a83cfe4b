//! Bounded telemetry event ring.
//!
//! Events carry a wallclock timestamp (milliseconds since the epoch), a
//! name, three numeric payloads, and a free-form tag. The ring holds the
//! most recent `limit` events (default 512); the oldest is evicted on
//! overflow. Snapshots return the trailing window in chronological
//! order.

mod table;

pub use table::format_table;

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Default event capacity.
pub const DEFAULT_EVENT_LIMIT: usize = 512;

/// One telemetry event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryEvent {
    /// Milliseconds since the Unix epoch at push time.
    pub t: u64,
    pub name: String,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub tag: String,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[derive(Debug)]
struct Inner {
    events: VecDeque<TelemetryEvent>,
    limit: usize,
}

/// The event ring. Owns its own exclusion.
#[derive(Debug)]
pub struct TelemetryRing {
    inner: Mutex<Inner>,
}

impl Default for TelemetryRing {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LIMIT)
    }
}

impl TelemetryRing {
    pub fn new(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: VecDeque::new(),
                limit: limit.max(1),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends an event stamped with the current wallclock.
    pub fn push(&self, name: &str, a: f64, b: f64, c: f64, tag: &str) {
        self.push_event(TelemetryEvent {
            t: now_ms(),
            name: name.to_string(),
            a,
            b,
            c,
            tag: tag.to_string(),
        });
    }

    /// Appends a pre-built event, evicting the oldest on overflow.
    pub fn push_event(&self, event: TelemetryEvent) {
        let mut inner = self.lock();
        inner.events.push_back(event);
        if inner.events.len() > inner.limit {
            inner.events.pop_front();
        }
    }

    /// Changes the capacity, evicting oldest events as needed. Zero is
    /// treated as one.
    pub fn set_limit(&self, limit: usize) {
        let mut inner = self.lock();
        inner.limit = limit.max(1);
        while inner.events.len() > inner.limit {
            inner.events.pop_front();
        }
    }

    pub fn limit(&self) -> usize {
        self.lock().limit
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    /// The trailing `max` events, oldest first.
    pub fn snapshot(&self, max: usize) -> Vec<TelemetryEvent> {
        let inner = self.lock();
        let n = max.max(1).min(inner.events.len());
        inner
            .events
            .iter()
            .skip(inner.events.len() - n)
            .cloned()
            .collect()
    }

    /// Snapshot as a JSON events array.
    pub fn snapshot_json(&self, max: usize) -> serde_json::Value {
        serde_json::json!({ "events": self.snapshot(max) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_len() {
        let ring = TelemetryRing::default();
        assert!(ring.is_empty());
        ring.push("fps", 60.0, 0.0, 0.0, "render");
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let ring = TelemetryRing::new(2);
        ring.push("a", 1.0, 0.0, 0.0, "");
        ring.push("b", 2.0, 0.0, 0.0, "");
        ring.push("c", 3.0, 0.0, 0.0, "");
        let events = ring.snapshot(10);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "b");
        assert_eq!(events[1].name, "c");
    }

    #[test]
    fn test_snapshot_is_chronological_tail() {
        let ring = TelemetryRing::default();
        for i in 0..10 {
            ring.push(&format!("e{i}"), i as f64, 0.0, 0.0, "");
        }
        let tail = ring.snapshot(3);
        assert_eq!(tail[0].name, "e7");
        assert_eq!(tail[2].name, "e9");
    }

    #[test]
    fn test_set_limit_trims() {
        let ring = TelemetryRing::default();
        for i in 0..10 {
            ring.push(&format!("e{i}"), 0.0, 0.0, 0.0, "");
        }
        ring.set_limit(4);
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.snapshot(10)[0].name, "e6");
    }

    #[test]
    fn test_zero_limit_becomes_one() {
        let ring = TelemetryRing::new(0);
        ring.push("a", 0.0, 0.0, 0.0, "");
        ring.push("b", 0.0, 0.0, 0.0, "");
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.limit(), 1);
    }

    #[test]
    fn test_events_carry_timestamps() {
        let ring = TelemetryRing::default();
        ring.push("a", 0.0, 0.0, 0.0, "");
        let event = &ring.snapshot(1)[0];
        assert!(event.t > 0);
    }

    #[test]
    fn test_snapshot_json_shape() {
        let ring = TelemetryRing::default();
        ring.push("speed", 1.0, 2.0, 3.0, "veh");
        let json = ring.snapshot_json(8);
        let event = &json["events"][0];
        assert_eq!(event["name"], "speed");
        assert_eq!(event["a"], 1.0);
        assert_eq!(event["tag"], "veh");
    }
}
