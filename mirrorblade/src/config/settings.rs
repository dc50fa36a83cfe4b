//! Configuration schema for the sidecar.
//!
//! [`BridgeConfig`] is the persisted record. Field names here are the
//! canonical on-disk names; anything else in the file is ignored on load.
//! Values are coerced on ingest (`traffic_boost` clamped, unknown log
//! levels fall back to `info`) so an in-memory config is always legal.

use serde::{Deserialize, Serialize};

/// Lower clamp bound for `traffic_boost`.
pub const TRAFFIC_BOOST_MIN: f64 = 0.10;

/// Upper clamp bound for `traffic_boost`.
pub const TRAFFIC_BOOST_MAX: f64 = 50.0;

/// Persisted schema version. Informational for now.
pub const CONFIG_VERSION: u32 = 1;

/// Default transport endpoint identifier.
pub const DEFAULT_PIPE_NAME: &str = "MirrorBladeBridge-v1";

/// Log sink severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Canonical lowercase name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses a level name. Unknown names fall back to `Info`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => LogLevel::Trace,
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamps a traffic multiplier into its legal range.
pub fn clamp_traffic_boost(v: f64) -> f64 {
    if !v.is_finite() {
        return 1.0;
    }
    v.clamp(TRAFFIC_BOOST_MIN, TRAFFIC_BOOST_MAX)
}

/// The full runtime configuration record.
///
/// Serialization uses canonical field names; deserialization ignores
/// unknown fields and fills missing ones with defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Persisted schema version (informational).
    pub version: u32,

    /// Runtime toggle mirrored to the upscaler sink.
    pub upscaler_enabled: bool,

    /// Runtime multiplier, clamped to [0.10, 50.0] on ingest.
    pub traffic_boost: f64,

    /// Whether the RPC server accepts new sessions.
    pub ipc_enabled: bool,

    /// Transport endpoint identifier.
    pub ipc_pipe_name: String,

    /// Log sink level.
    pub log_level: LogLevel,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            upscaler_enabled: false,
            traffic_boost: 1.0,
            ipc_enabled: true,
            ipc_pipe_name: DEFAULT_PIPE_NAME.to_string(),
            log_level: LogLevel::Info,
        }
    }
}

impl BridgeConfig {
    /// Returns this config with every numeric field coerced into range.
    pub fn coerced(mut self) -> Self {
        self.traffic_boost = clamp_traffic_boost(self.traffic_boost);
        self
    }

    /// Parses a config from JSON text, applying ingest coercion.
    ///
    /// Unknown top-level fields are ignored; missing fields take their
    /// defaults. Unknown `log_level` strings are handled before typed
    /// deserialization so they degrade to `info` instead of failing.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let mut value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(level) = value.get_mut("log_level") {
            let parsed = level.as_str().map(LogLevel::parse_lenient);
            if let Some(parsed) = parsed {
                *level = serde_json::Value::String(parsed.as_str().to_string());
            }
        }
        let cfg: BridgeConfig = serde_json::from_value(value)?;
        Ok(cfg.coerced())
    }

    /// Serializes to the canonical pretty (2-space indented) JSON form.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = BridgeConfig::default();
        assert!(!cfg.upscaler_enabled);
        assert!(cfg.ipc_enabled);
        assert_eq!(cfg.traffic_boost, 1.0);
        assert_eq!(cfg.ipc_pipe_name, DEFAULT_PIPE_NAME);
        assert_eq!(cfg.log_level, LogLevel::Info);
    }

    #[test]
    fn test_round_trip_preserves_legal_config() {
        let cfg = BridgeConfig {
            upscaler_enabled: true,
            traffic_boost: 2.5,
            ipc_enabled: false,
            ipc_pipe_name: "AltPipe".to_string(),
            log_level: LogLevel::Debug,
            ..Default::default()
        };
        let text = cfg.to_json_string();
        let parsed = BridgeConfig::from_json_str(&text).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_traffic_boost_clamped_on_ingest() {
        let parsed = BridgeConfig::from_json_str(r#"{"traffic_boost": 100.0}"#).unwrap();
        assert_eq!(parsed.traffic_boost, TRAFFIC_BOOST_MAX);

        let parsed = BridgeConfig::from_json_str(r#"{"traffic_boost": 0.0}"#).unwrap();
        assert_eq!(parsed.traffic_boost, TRAFFIC_BOOST_MIN);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let parsed =
            BridgeConfig::from_json_str(r#"{"upscaler_enabled": true, "no_such_field": 42}"#)
                .unwrap();
        assert!(parsed.upscaler_enabled);
    }

    #[test]
    fn test_unknown_log_level_falls_back_to_info() {
        let parsed = BridgeConfig::from_json_str(r#"{"log_level": "verbose"}"#).unwrap();
        assert_eq!(parsed.log_level, LogLevel::Info);
    }

    #[test]
    fn test_log_level_parse_lenient() {
        assert_eq!(LogLevel::parse_lenient("TRACE"), LogLevel::Trace);
        assert_eq!(LogLevel::parse_lenient("warn"), LogLevel::Warn);
        assert_eq!(LogLevel::parse_lenient("???"), LogLevel::Info);
    }

    #[test]
    fn test_non_finite_traffic_boost_resets() {
        assert_eq!(clamp_traffic_boost(f64::NAN), 1.0);
        assert_eq!(clamp_traffic_boost(f64::INFINITY), 1.0);
    }
}
