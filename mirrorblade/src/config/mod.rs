//! Configuration: schema, live store, persistence, and hot reload.
//!
//! The split mirrors the config lifecycle: [`settings`] defines the
//! persisted record, [`store`] holds the live atomics the rest of the
//! sidecar reads, [`file`] handles load/save with atomic replace, and
//! [`watcher`] keeps the store synchronized with edits on disk.

pub mod file;
pub mod settings;
pub mod store;
pub mod watcher;

pub use file::{boot_script_path, config_path, load_from, save_to, ConfigFileError};
pub use settings::{
    clamp_traffic_boost, BridgeConfig, LogLevel, CONFIG_VERSION, DEFAULT_PIPE_NAME,
    TRAFFIC_BOOST_MAX, TRAFFIC_BOOST_MIN,
};
pub use store::{ConfigDiff, ConfigStore};
pub use watcher::{ConfigWatcher, POLL_INTERVAL, STABLE_TICKS};
