//! Config persistence, clamping, and hot-reload behavior.

use mirrorblade::config::settings::{LogLevel, TRAFFIC_BOOST_MAX, TRAFFIC_BOOST_MIN};
use mirrorblade::config::{config_path, load_from, save_to, BridgeConfig, ConfigStore, ConfigWatcher};
use mirrorblade::sinks::{LogLevelSink, RuntimeSinks, TrafficSink, UpscaleMode, UpscalerParams, UpscalerSink};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Records sink calls so tests can assert on broadcasts.
#[derive(Debug, Default)]
struct Recorder {
    enabled: Mutex<Vec<bool>>,
    multipliers: Mutex<Vec<f64>>,
    levels: Mutex<Vec<LogLevel>>,
}

impl UpscalerSink for Recorder {
    fn set_enabled(&self, enabled: bool) {
        self.enabled.lock().unwrap().push(enabled);
    }
    fn set_mode(&self, _mode: UpscaleMode) {}
    fn set_params(&self, _params: UpscalerParams) {}
    fn resize(&self, _params: UpscalerParams) {}
}

impl TrafficSink for Recorder {
    fn set_multiplier(&self, mult: f64) {
        self.multipliers.lock().unwrap().push(mult);
    }
}

impl LogLevelSink for Recorder {
    fn set_level(&self, level: LogLevel) {
        self.levels.lock().unwrap().push(level);
    }
}

fn recording_sinks() -> (RuntimeSinks, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let sinks = RuntimeSinks {
        upscaler: recorder.clone(),
        traffic: recorder.clone(),
        log: recorder.clone(),
    };
    (sinks, recorder)
}

#[test]
fn test_canonical_round_trip_for_legal_configs() {
    let cases = [
        BridgeConfig::default(),
        BridgeConfig {
            upscaler_enabled: true,
            traffic_boost: TRAFFIC_BOOST_MIN,
            ipc_enabled: false,
            ipc_pipe_name: "Other-Pipe".to_string(),
            log_level: LogLevel::Trace,
            ..Default::default()
        },
        BridgeConfig {
            traffic_boost: TRAFFIC_BOOST_MAX,
            log_level: LogLevel::Error,
            ..Default::default()
        },
    ];

    let dir = tempfile::TempDir::new().unwrap();
    let path = config_path(dir.path());
    for cfg in cases {
        save_to(&path, &cfg).unwrap();
        assert_eq!(load_from(&path), cfg);
    }
}

#[test]
fn test_store_observes_clamped_values_only() {
    let store = ConfigStore::default();
    for (input, expected) in [
        (0.0, TRAFFIC_BOOST_MIN),
        (0.10, 0.10),
        (1.0, 1.0),
        (50.0, 50.0),
        (50.01, TRAFFIC_BOOST_MAX),
        (-3.0, TRAFFIC_BOOST_MIN),
    ] {
        assert_eq!(store.set_traffic_boost(input), expected);
        assert_eq!(store.traffic_boost(), expected);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_hot_reload_reaches_sink_without_rpc() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = config_path(dir.path());
    save_to(&path, &BridgeConfig::default()).unwrap();

    let store = Arc::new(ConfigStore::default());
    let (sinks, recorder) = recording_sinks();
    let shutdown = CancellationToken::new();

    let watcher = ConfigWatcher::new(path.clone(), store.clone(), sinks);
    let task = tokio::spawn(watcher.run(shutdown.clone()));

    // Let the watcher take its baseline, then edit the file the way an
    // editor would (atomic replace).
    tokio::time::sleep(Duration::from_millis(400)).await;
    let mut cfg = BridgeConfig::default();
    cfg.upscaler_enabled = true;
    save_to(&path, &cfg).unwrap();

    // The sink must observe set_enabled(true) within the debounce
    // window plus margin, with no RPC involved.
    let deadline = Instant::now() + Duration::from_millis(2500);
    loop {
        if recorder.enabled.lock().unwrap().contains(&true) {
            break;
        }
        assert!(Instant::now() < deadline, "hot reload never reached the sink");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(store.upscaler_enabled());

    shutdown.cancel();
    task.await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_reload_keeps_defaults_on_broken_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = config_path(dir.path());
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{broken json").unwrap();

    let cfg = load_from(&path);
    assert_eq!(cfg, BridgeConfig::default());
}

#[test]
fn test_apply_broadcast_is_idempotent() {
    let (sinks, recorder) = recording_sinks();
    let cfg = BridgeConfig {
        traffic_boost: 2.0,
        ..Default::default()
    };
    sinks.apply(&cfg);
    sinks.apply(&cfg);
    sinks.apply(&cfg);
    assert_eq!(*recorder.multipliers.lock().unwrap(), vec![2.0, 2.0, 2.0]);
}
