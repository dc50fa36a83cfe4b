//! Hot-reload watcher for the config file.
//!
//! Polls the file's last-write timestamp every 250 ms. A change commits
//! only after four consecutive stable polls (~1 s), which debounces the
//! write-temp-then-rename sequences editors produce. On commit the file
//! is reloaded, the store replaced, and the runtime sinks re-applied.

use super::file::load_from;
use super::store::ConfigStore;
use crate::sinks::RuntimeSinks;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Interval between timestamp polls.
pub const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Consecutive stable polls required before a change commits.
pub const STABLE_TICKS: u32 = 4;

/// Watches one config file and rebroadcasts committed changes.
pub struct ConfigWatcher {
    path: PathBuf,
    store: Arc<ConfigStore>,
    sinks: RuntimeSinks,
}

impl ConfigWatcher {
    pub fn new(path: PathBuf, store: Arc<ConfigStore>, sinks: RuntimeSinks) -> Self {
        Self { path, store, sinks }
    }

    /// Runs until `shutdown` is cancelled.
    ///
    /// Poll errors (file temporarily missing during an atomic replace,
    /// permission hiccups) are treated as "no timestamp" and polling
    /// continues.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(path = %self.path.display(), "Config watcher started");

        let mut last = self.mtime().await;
        let mut probe = last;
        let mut stable_ticks: u32 = 0;

        let mut poll = tokio::time::interval(POLL_INTERVAL);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Config watcher stopping");
                    break;
                }

                _ = poll.tick() => {
                    let now = self.mtime().await;

                    if now != probe {
                        // Observed a change; begin (or restart) the debounce window.
                        probe = now;
                        stable_ticks = 0;
                    } else if now != last {
                        stable_ticks += 1;
                        if stable_ticks >= STABLE_TICKS {
                            last = now;
                            stable_ticks = 0;
                            self.commit();
                        }
                    }
                }
            }
        }
    }

    /// Reloads from disk, replaces the store, and re-applies runtime state.
    fn commit(&self) {
        let cfg = load_from(&self.path);
        let diff = self.store.replace(cfg.clone());
        if diff.any() {
            info!("Config auto-reloaded");
        } else {
            debug!("Config auto-reload produced no changes");
        }
        self.sinks.apply(&cfg);
    }

    async fn mtime(&self) -> Option<SystemTime> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.modified().ok(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Config poll failed");
                None
            }
        }
    }
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::{config_path, save_to};
    use crate::config::settings::BridgeConfig;
    use crate::sinks::test_support::RecordingSink;

    fn recording_sinks() -> (RuntimeSinks, Arc<RecordingSink>) {
        let recorder = Arc::new(RecordingSink::default());
        let sinks = RuntimeSinks {
            upscaler: recorder.clone(),
            traffic: recorder.clone(),
            log: recorder.clone(),
        };
        (sinks, recorder)
    }

    #[tokio::test]
    async fn test_commit_replaces_store_and_applies() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = config_path(dir.path());

        let mut cfg = BridgeConfig::default();
        cfg.upscaler_enabled = true;
        save_to(&path, &cfg).unwrap();

        let store = Arc::new(ConfigStore::default());
        let (sinks, recorder) = recording_sinks();
        let watcher = ConfigWatcher::new(path, store.clone(), sinks);

        watcher.commit();
        assert!(store.upscaler_enabled());
        assert_eq!(*recorder.enabled_calls.lock().unwrap(), vec![true]);
    }

    #[tokio::test]
    async fn test_change_commits_after_debounce() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = config_path(dir.path());
        save_to(&path, &BridgeConfig::default()).unwrap();

        let store = Arc::new(ConfigStore::default());
        let (sinks, _recorder) = recording_sinks();
        let shutdown = CancellationToken::new();

        let watcher = ConfigWatcher::new(path.clone(), store.clone(), sinks);
        let task = tokio::spawn(watcher.run(shutdown.clone()));

        // Give the watcher a baseline poll, then modify the file.
        tokio::time::sleep(Duration::from_millis(400)).await;
        let mut cfg = BridgeConfig::default();
        cfg.traffic_boost = 7.5;
        save_to(&path, &cfg).unwrap();

        // Debounce is 4 polls at 250 ms; 2 s is comfortably past it.
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(store.traffic_boost(), 7.5);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_is_prompt() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = config_path(dir.path());

        let store = Arc::new(ConfigStore::default());
        let (sinks, _recorder) = recording_sinks();
        let shutdown = CancellationToken::new();

        let watcher = ConfigWatcher::new(path, store, sinks);
        let task = tokio::spawn(watcher.run(shutdown.clone()));

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("watcher did not stop promptly")
            .unwrap();
    }
}
