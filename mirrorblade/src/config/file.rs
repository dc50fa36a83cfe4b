//! Configuration file handling.
//!
//! The config lives at `<host-root>/r6/config/MirrorBlade.json`. Loads are
//! forgiving (missing file or parse failure falls back to defaults); saves
//! are atomic: serialize to a temp file in the target directory, then
//! persist over the destination.

use super::settings::BridgeConfig;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Configuration file errors. Only saves surface errors; loads degrade.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to create the config directory
    #[error("failed to create config directory: {0}")]
    Directory(std::io::Error),

    /// Failed to stage the temp file
    #[error("failed to write config: {0}")]
    Write(std::io::Error),

    /// Failed to rename the temp file over the target
    #[error("failed to persist config: {0}")]
    Persist(std::io::Error),
}

/// Resolves the config path under the host root.
pub fn config_path(host_root: &Path) -> PathBuf {
    host_root.join("r6").join("config").join("MirrorBlade.json")
}

/// Resolves the optional boot-script path under the host root.
pub fn boot_script_path(host_root: &Path) -> PathBuf {
    host_root.join("r6").join("config").join("config.json")
}

/// Loads the config from `path`.
///
/// A missing file or a parse failure yields defaults; the event is logged
/// at debug or warn respectively and never surfaces to the caller.
pub fn load_from(path: &Path) -> BridgeConfig {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return BridgeConfig::default();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read config, using defaults");
            return BridgeConfig::default();
        }
    };

    match BridgeConfig::from_json_str(&text) {
        Ok(cfg) => {
            info!(
                upscaler = cfg.upscaler_enabled,
                traffic = cfg.traffic_boost,
                ipc = cfg.ipc_enabled,
                "Config loaded"
            );
            cfg
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Config parse error, using defaults");
            BridgeConfig::default()
        }
    }
}

/// Atomically persists `cfg` to `path`.
///
/// Writes `<path>.tmp`-style staging through [`tempfile::NamedTempFile`]
/// in the destination directory, flushes, then renames over the target.
/// The temp file is removed on every failure path by its drop guard.
pub fn save_to(path: &Path, cfg: &BridgeConfig) -> Result<(), ConfigFileError> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(ConfigFileError::Directory)?;

    let mut tmp = tempfile::Builder::new()
        .prefix("MirrorBlade.json.")
        .suffix(".tmp")
        .tempfile_in(parent)
        .map_err(ConfigFileError::Write)?;

    tmp.write_all(cfg.to_json_string().as_bytes())
        .map_err(ConfigFileError::Write)?;
    tmp.flush().map_err(ConfigFileError::Write)?;
    tmp.as_file().sync_all().map_err(ConfigFileError::Write)?;

    tmp.persist(path)
        .map_err(|e| ConfigFileError::Persist(e.error))?;

    info!(path = %path.display(), "Config saved");
    Ok(())
}
