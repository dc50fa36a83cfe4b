//! Priority lanes for the worker pool.

use serde::{Deserialize, Serialize};

/// One of the four priority bands tasks are enqueued into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    High,
    Normal,
    Low,
    Io,
}

impl Lane {
    /// All lanes, in schedule order.
    pub const ALL: [Lane; 4] = [Lane::High, Lane::Normal, Lane::Low, Lane::Io];

    /// Stable index into per-lane arrays.
    pub(crate) fn index(self) -> usize {
        match self {
            Lane::High => 0,
            Lane::Normal => 1,
            Lane::Low => 2,
            Lane::Io => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Lane::High => "high",
            Lane::Normal => "normal",
            Lane::Low => "low",
            Lane::Io => "io",
        }
    }
}

impl std::fmt::Display for Lane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_are_distinct_and_dense() {
        let mut seen = [false; 4];
        for lane in Lane::ALL {
            assert!(!seen[lane.index()]);
            seen[lane.index()] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
