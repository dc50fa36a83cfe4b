//! External runtime sinks.
//!
//! The sidecar broadcasts configuration effects to whatever the host
//! wires in: an upscaler backend, a traffic system, the log filter. Every
//! sink is optional; the defaults are no-ops so the sidecar runs headless.

use crate::config::settings::{BridgeConfig, LogLevel};
use std::sync::Arc;
use tracing::debug;

/// Upscaler operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpscaleMode {
    #[default]
    Off,
    Fsr2,
}

impl UpscaleMode {
    pub fn as_str(self) -> &'static str {
        match self {
            UpscaleMode::Off => "off",
            UpscaleMode::Fsr2 => "fsr2",
        }
    }

    /// Parses a mode name; `None` for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "off" => Some(UpscaleMode::Off),
            "fsr2" => Some(UpscaleMode::Fsr2),
            _ => None,
        }
    }
}

/// Upscaler tuning parameters, mutated by the graphics ops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpscalerParams {
    pub sharpness: f64,
    pub output_width: u32,
    pub output_height: u32,
    pub render_width: u32,
    pub render_height: u32,
}

impl Default for UpscalerParams {
    fn default() -> Self {
        Self {
            sharpness: 0.6,
            output_width: 3840,
            output_height: 2160,
            render_width: 3840,
            render_height: 2160,
        }
    }
}

/// Contract for an upscaler backend.
pub trait UpscalerSink: Send + Sync {
    fn set_enabled(&self, enabled: bool);
    fn set_mode(&self, mode: UpscaleMode);
    fn set_params(&self, params: UpscalerParams);
    fn resize(&self, params: UpscalerParams);
}

/// Contract for a traffic-density backend.
pub trait TrafficSink: Send + Sync {
    fn set_multiplier(&self, mult: f64);
}

/// Contract for the log filter.
pub trait LogLevelSink: Send + Sync {
    fn set_level(&self, level: LogLevel);
}

/// Absent-backend stand-in; every call is a no-op.
#[derive(Debug, Default)]
pub struct NullSink;

impl UpscalerSink for NullSink {
    fn set_enabled(&self, _enabled: bool) {}
    fn set_mode(&self, _mode: UpscaleMode) {}
    fn set_params(&self, _params: UpscalerParams) {}
    fn resize(&self, _params: UpscalerParams) {}
}

impl TrafficSink for NullSink {
    fn set_multiplier(&self, _mult: f64) {}
}

impl LogLevelSink for NullSink {
    fn set_level(&self, _level: LogLevel) {}
}

/// The set of sinks the sidecar broadcasts to.
#[derive(Clone)]
pub struct RuntimeSinks {
    pub upscaler: Arc<dyn UpscalerSink>,
    pub traffic: Arc<dyn TrafficSink>,
    pub log: Arc<dyn LogLevelSink>,
}

impl RuntimeSinks {
    /// Sinks that discard everything.
    pub fn disconnected() -> Self {
        let null = Arc::new(NullSink);
        Self {
            upscaler: null.clone(),
            traffic: null.clone(),
            log: null,
        }
    }

    /// Pushes the current config to every sink.
    ///
    /// Idempotent and callable from any thread; sinks must tolerate
    /// repeated identical values.
    pub fn apply(&self, cfg: &BridgeConfig) {
        self.upscaler.set_enabled(cfg.upscaler_enabled);
        self.traffic.set_multiplier(cfg.traffic_boost);
        self.log.set_level(cfg.log_level);
        debug!(
            upscaler = cfg.upscaler_enabled,
            traffic = cfg.traffic_boost,
            log_level = %cfg.log_level,
            "Runtime applied"
        );
    }
}

impl std::fmt::Debug for RuntimeSinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeSinks").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Records every call for assertions in tests.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub enabled_calls: Mutex<Vec<bool>>,
        pub multiplier_calls: Mutex<Vec<f64>>,
        pub level_calls: Mutex<Vec<LogLevel>>,
    }

    impl UpscalerSink for RecordingSink {
        fn set_enabled(&self, enabled: bool) {
            self.enabled_calls.lock().unwrap().push(enabled);
        }
        fn set_mode(&self, _mode: UpscaleMode) {}
        fn set_params(&self, _params: UpscalerParams) {}
        fn resize(&self, _params: UpscalerParams) {}
    }

    impl TrafficSink for RecordingSink {
        fn set_multiplier(&self, mult: f64) {
            self.multiplier_calls.lock().unwrap().push(mult);
        }
    }

    impl LogLevelSink for RecordingSink {
        fn set_level(&self, level: LogLevel) {
            self.level_calls.lock().unwrap().push(level);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingSink;
    use super::*;

    #[test]
    fn test_apply_broadcasts_every_field() {
        let recorder = Arc::new(RecordingSink::default());
        let sinks = RuntimeSinks {
            upscaler: recorder.clone(),
            traffic: recorder.clone(),
            log: recorder.clone(),
        };

        let cfg = BridgeConfig {
            upscaler_enabled: true,
            traffic_boost: 2.0,
            log_level: LogLevel::Warn,
            ..Default::default()
        };
        sinks.apply(&cfg);
        sinks.apply(&cfg); // idempotent

        assert_eq!(*recorder.enabled_calls.lock().unwrap(), vec![true, true]);
        assert_eq!(*recorder.multiplier_calls.lock().unwrap(), vec![2.0, 2.0]);
        assert_eq!(
            *recorder.level_calls.lock().unwrap(),
            vec![LogLevel::Warn, LogLevel::Warn]
        );
    }

    #[test]
    fn test_disconnected_sinks_accept_everything() {
        let sinks = RuntimeSinks::disconnected();
        sinks.apply(&BridgeConfig::default());
    }

    #[test]
    fn test_mode_parse() {
        assert_eq!(UpscaleMode::parse("off"), Some(UpscaleMode::Off));
        assert_eq!(UpscaleMode::parse("fsr2"), Some(UpscaleMode::Fsr2));
        assert_eq!(UpscaleMode::parse("dlss"), None);
    }
}
