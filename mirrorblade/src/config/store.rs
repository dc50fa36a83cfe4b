//! In-memory configuration store.
//!
//! Each scalar field lives in an atomic so the hot paths (RPC dispatch,
//! worker tasks) read without locking. The single string field is guarded
//! by a mutex. Readers always get a by-value snapshot; there is no torn
//! mixture of fields because [`ConfigStore::replace`] writes every field
//! from one source record and readers of composite state go through
//! [`ConfigStore::snapshot`].

use super::settings::{clamp_traffic_boost, BridgeConfig, LogLevel};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Mutex;

/// Which fields changed during a [`ConfigStore::replace`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigDiff {
    pub upscaler_enabled: bool,
    pub traffic_boost: bool,
    pub ipc_enabled: bool,
    pub ipc_pipe_name: bool,
    pub log_level: bool,
}

impl ConfigDiff {
    /// True if any field changed.
    pub fn any(&self) -> bool {
        self.upscaler_enabled
            || self.traffic_boost
            || self.ipc_enabled
            || self.ipc_pipe_name
            || self.log_level
    }
}

fn level_to_u8(level: LogLevel) -> u8 {
    match level {
        LogLevel::Trace => 0,
        LogLevel::Debug => 1,
        LogLevel::Info => 2,
        LogLevel::Warn => 3,
        LogLevel::Error => 4,
    }
}

fn level_from_u8(v: u8) -> LogLevel {
    match v {
        0 => LogLevel::Trace,
        1 => LogLevel::Debug,
        3 => LogLevel::Warn,
        4 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}

/// Typed, lock-light holder of the live configuration.
#[derive(Debug)]
pub struct ConfigStore {
    upscaler_enabled: AtomicBool,
    traffic_boost_bits: AtomicU64,
    ipc_enabled: AtomicBool,
    log_level: AtomicU8,
    ipc_pipe_name: Mutex<String>,
    /// Short exclusion for composite reads/writes: single-field access
    /// stays lock-free, but `snapshot` and `replace` serialize against
    /// each other so no reader sees a half-replaced record.
    composite: Mutex<()>,
}

impl ConfigStore {
    /// Creates a store seeded from `cfg`.
    pub fn new(cfg: BridgeConfig) -> Self {
        let cfg = cfg.coerced();
        Self {
            upscaler_enabled: AtomicBool::new(cfg.upscaler_enabled),
            traffic_boost_bits: AtomicU64::new(cfg.traffic_boost.to_bits()),
            ipc_enabled: AtomicBool::new(cfg.ipc_enabled),
            log_level: AtomicU8::new(level_to_u8(cfg.log_level)),
            ipc_pipe_name: Mutex::new(cfg.ipc_pipe_name),
            composite: Mutex::new(()),
        }
    }

    fn composite_guard(&self) -> std::sync::MutexGuard<'_, ()> {
        match self.composite.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn upscaler_enabled(&self) -> bool {
        self.upscaler_enabled.load(Ordering::Acquire)
    }

    pub fn set_upscaler_enabled(&self, on: bool) {
        self.upscaler_enabled.store(on, Ordering::Release);
    }

    pub fn traffic_boost(&self) -> f64 {
        f64::from_bits(self.traffic_boost_bits.load(Ordering::Acquire))
    }

    /// Stores a clamped multiplier and returns the value actually stored.
    pub fn set_traffic_boost(&self, v: f64) -> f64 {
        let clamped = clamp_traffic_boost(v);
        self.traffic_boost_bits
            .store(clamped.to_bits(), Ordering::Release);
        clamped
    }

    pub fn ipc_enabled(&self) -> bool {
        self.ipc_enabled.load(Ordering::Acquire)
    }

    pub fn set_ipc_enabled(&self, on: bool) {
        self.ipc_enabled.store(on, Ordering::Release);
    }

    pub fn log_level(&self) -> LogLevel {
        level_from_u8(self.log_level.load(Ordering::Acquire))
    }

    pub fn set_log_level(&self, level: LogLevel) {
        self.log_level.store(level_to_u8(level), Ordering::Release);
    }

    pub fn ipc_pipe_name(&self) -> String {
        self.ipc_pipe_name
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn set_ipc_pipe_name(&self, name: impl Into<String>) {
        if let Ok(mut guard) = self.ipc_pipe_name.lock() {
            *guard = name.into();
        }
    }

    /// Returns a consistent by-value snapshot of every field.
    pub fn snapshot(&self) -> BridgeConfig {
        let _composite = self.composite_guard();
        BridgeConfig {
            upscaler_enabled: self.upscaler_enabled(),
            traffic_boost: self.traffic_boost(),
            ipc_enabled: self.ipc_enabled(),
            ipc_pipe_name: self.ipc_pipe_name(),
            log_level: self.log_level(),
            ..Default::default()
        }
    }

    fn snapshot_unlocked(&self) -> BridgeConfig {
        BridgeConfig {
            upscaler_enabled: self.upscaler_enabled(),
            traffic_boost: self.traffic_boost(),
            ipc_enabled: self.ipc_enabled(),
            ipc_pipe_name: self.ipc_pipe_name(),
            log_level: self.log_level(),
            ..Default::default()
        }
    }

    /// Replaces every field from `cfg` and reports what changed.
    pub fn replace(&self, cfg: BridgeConfig) -> ConfigDiff {
        let _composite = self.composite_guard();
        let cfg = cfg.coerced();
        let before = self.snapshot_unlocked();

        self.set_upscaler_enabled(cfg.upscaler_enabled);
        self.set_traffic_boost(cfg.traffic_boost);
        self.set_ipc_enabled(cfg.ipc_enabled);
        self.set_log_level(cfg.log_level);
        self.set_ipc_pipe_name(cfg.ipc_pipe_name.clone());

        ConfigDiff {
            upscaler_enabled: before.upscaler_enabled != cfg.upscaler_enabled,
            traffic_boost: before.traffic_boost != cfg.traffic_boost,
            ipc_enabled: before.ipc_enabled != cfg.ipc_enabled,
            ipc_pipe_name: before.ipc_pipe_name != cfg.ipc_pipe_name,
            log_level: before.log_level != cfg.log_level,
        }
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(BridgeConfig::default())
    }
}
