//! Logging infrastructure.
//!
//! Structured logging through `tracing`, with two outputs:
//! - a non-blocking rolling file under the given log directory
//! - stdout for interactive tailing
//!
//! The filter sits behind a reload handle so the `log_level` config
//! field can retarget verbosity at runtime without touching the global
//! subscriber.

use crate::config::settings::LogLevel;
use crate::sinks::LogLevelSink;
use std::io;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{reload, EnvFilter, Registry};

/// Base name of the rolling log file.
pub const LOG_FILE_PREFIX: &str = "mirrorblade.log";

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping it flushes and closes the file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Runtime handle for retargeting the log filter.
#[derive(Clone)]
pub struct LevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl LevelHandle {
    /// Swaps the active filter for one at `level`. `RUST_LOG` overrides
    /// set at startup are replaced.
    pub fn reload_level(&self, level: LogLevel) {
        let filter = EnvFilter::new(level.as_str());
        if let Err(e) = self.handle.reload(filter) {
            // The subscriber is gone only during shutdown; nothing to do.
            eprintln!("log filter reload failed: {e}");
        }
    }
}

impl LogLevelSink for LevelHandle {
    fn set_level(&self, level: LogLevel) {
        self.reload_level(level);
    }
}

impl std::fmt::Debug for LevelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelHandle").finish_non_exhaustive()
    }
}

/// Initializes the global subscriber.
///
/// `RUST_LOG` takes precedence over `level` for the initial filter, so
/// ad-hoc debugging does not require a config edit.
///
/// # Errors
///
/// Fails if the log directory cannot be created. This is one of the few
/// fatal startup conditions.
pub fn init_logging(log_dir: &str, level: LogLevel) -> io::Result<(LoggingGuard, LevelHandle)> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let (filter_layer, reload_handle) = reload::Layer::new(env_filter);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false)
        .with_target(true);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok((
        LoggingGuard {
            _file_guard: file_guard,
        },
        LevelHandle {
            handle: reload_handle,
        },
    ))
}

/// Default log directory, relative to the working directory.
pub fn default_log_dir() -> &'static str {
    "logs"
}
