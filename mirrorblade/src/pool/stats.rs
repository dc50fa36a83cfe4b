//! Worker-pool statistics snapshots.

use super::lane::Lane;
use serde::Serialize;

/// Counters for one lane.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LaneStats {
    /// Tasks accepted into the lane since the pool last started.
    pub enqueued: u64,
    /// Tasks completed (including ones that panicked).
    pub executed: u64,
    /// Tasks currently waiting in the lane.
    pub pending: usize,
}

/// Atomic snapshot of the whole pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PoolStats {
    pub high: LaneStats,
    pub normal: LaneStats,
    pub low: LaneStats,
    pub io: LaneStats,
    /// Exponentially weighted moving average of per-task wallclock, in
    /// microseconds. Zero until the first task completes.
    pub ewma_usec: f64,
}

impl PoolStats {
    pub fn lane(&self, lane: Lane) -> &LaneStats {
        match lane {
            Lane::High => &self.high,
            Lane::Normal => &self.normal,
            Lane::Low => &self.low,
            Lane::Io => &self.io,
        }
    }

    /// Total tasks waiting across all lanes.
    pub fn pending_total(&self) -> usize {
        self.high.pending + self.normal.pending + self.low.pending + self.io.pending
    }

    /// Total tasks completed across all lanes.
    pub fn executed_total(&self) -> u64 {
        self.high.executed + self.normal.executed + self.low.executed + self.io.executed
    }

    /// Total tasks accepted across all lanes.
    pub fn enqueued_total(&self) -> u64 {
        self.high.enqueued + self.normal.enqueued + self.low.enqueued + self.io.enqueued
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_totals_sum_lanes() {
        let stats = PoolStats {
            high: LaneStats {
                enqueued: 4,
                executed: 3,
                pending: 1,
            },
            io: LaneStats {
                enqueued: 2,
                executed: 2,
                pending: 0,
            },
            ..Default::default()
        };
        assert_eq!(stats.enqueued_total(), 6);
        assert_eq!(stats.executed_total(), 5);
        assert_eq!(stats.pending_total(), 1);
    }

    #[test]
    fn test_json_shape() {
        let stats = PoolStats::default();
        let json = stats.to_json();
        assert!(json.get("high").is_some());
        assert!(json.get("ewma_usec").is_some());
    }
}
