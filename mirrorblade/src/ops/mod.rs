//! Operation registry and dispatch.
//!
//! Operations are name-keyed handlers over JSON argument objects.
//! Dispatch looks the handler up in the concurrent map, drops the map
//! guard, invokes, and wraps the outcome in the reply envelope. Handler
//! failures (including panics) become structured errors; they never
//! propagate.

mod args;
pub mod core;
pub mod numeric;
pub mod stubs;

pub use args::{opt_bool, opt_f64, opt_str, opt_u64, require_f64, require_str};

use crate::config::store::ConfigStore;
use crate::eval::{Figure8, Infinitizer, Interfold, ScootyRing, Underfold};
use crate::guards::FeatureGuards;
use crate::loader::Loader;
use crate::pool::WorkerPool;
use crate::rpc::wire::ErrorCode;
use crate::sinks::{RuntimeSinks, UpscalerParams};
use crate::telemetry::TelemetryRing;
use dashmap::DashMap;
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Handler failure taxonomy, mapped onto the wire error codes.
#[derive(Debug, Error)]
pub enum OpError {
    #[error("{0}")]
    BadArgs(String),

    #[error("Unknown op: {0}")]
    UnknownOp(String),

    #[error("{0}")]
    Failed(String),

    #[error("{0}")]
    Unavailable(String),
}

impl OpError {
    pub fn code(&self) -> ErrorCode {
        match self {
            OpError::BadArgs(_) => ErrorCode::BadArgs,
            OpError::UnknownOp(_) => ErrorCode::UnknownOp,
            OpError::Failed(_) => ErrorCode::Exception,
            OpError::Unavailable(_) => ErrorCode::Unavailable,
        }
    }
}

/// An operation handler: pure mapping from arguments to a result value.
pub type OpHandler = Arc<dyn Fn(&Value) -> Result<Value, OpError> + Send + Sync>;

/// Everything handlers may touch. One instance is shared by the
/// registry, the RPC server, and the C ABI surface.
pub struct OpContext {
    pub store: Arc<ConfigStore>,
    pub config_path: PathBuf,
    pub pool: Arc<WorkerPool>,
    pub sinks: RuntimeSinks,
    pub loader: Arc<Loader>,
    pub telemetry: Arc<TelemetryRing>,
    pub scooty: Arc<ScootyRing>,
    pub guards: Arc<FeatureGuards>,
    pub underfold: Arc<Underfold>,
    pub interfold: Arc<Interfold>,
    pub figure8: Arc<Figure8>,
    pub jitter: Arc<Infinitizer>,
    pub upscaler_params: Mutex<UpscalerParams>,
}

impl OpContext {
    /// Builds a context around the given core subsystems, with fresh
    /// evaluator instances.
    pub fn new(
        store: Arc<ConfigStore>,
        pool: Arc<WorkerPool>,
        sinks: RuntimeSinks,
        config_path: PathBuf,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            config_path,
            pool,
            sinks,
            loader: Arc::new(Loader::new()),
            telemetry: Arc::new(TelemetryRing::default()),
            scooty: Arc::new(ScootyRing::default()),
            guards: Arc::new(FeatureGuards::new()),
            underfold: Arc::new(Underfold::new()),
            interfold: Arc::new(Interfold::default()),
            figure8: Arc::new(Figure8::default()),
            jitter: Arc::new(Infinitizer::default()),
            upscaler_params: Mutex::new(UpscalerParams::default()),
        })
    }

    /// A context over default subsystems, for tests and embedding.
    pub fn standalone() -> Arc<Self> {
        Self::new(
            Arc::new(ConfigStore::default()),
            WorkerPool::with_defaults(),
            RuntimeSinks::disconnected(),
            PathBuf::from("MirrorBlade.json"),
        )
    }

    pub fn upscaler_params(&self) -> UpscalerParams {
        match self.upscaler_params.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn update_upscaler_params(&self, apply: impl FnOnce(&mut UpscalerParams)) -> UpscalerParams {
        let mut guard = match self.upscaler_params.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(&mut guard);
        *guard
    }
}

impl std::fmt::Debug for OpContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpContext")
            .field("config_path", &self.config_path)
            .finish_non_exhaustive()
    }
}

/// Name-keyed dispatch table.
#[derive(Default)]
pub struct OpRegistry {
    map: DashMap<String, OpHandler>,
}

impl OpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a handler. Names are case-sensitive,
    /// dot-separated ASCII.
    pub fn register<F>(&self, name: &str, handler: F)
    where
        F: Fn(&Value) -> Result<Value, OpError> + Send + Sync + 'static,
    {
        self.map.insert(name.to_string(), Arc::new(handler));
        debug!(op = name, "Op registered");
    }

    pub fn exists(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Looks up and invokes a handler, returning the reply envelope on
    /// success. The map guard is released before invocation. A handler
    /// value that already carries an `ok` field passes through
    /// unchanged; anything else is wrapped as `{ ok: true, result }`.
    pub fn dispatch_result(&self, name: &str, args: &Value) -> Result<Value, OpError> {
        let handler = self
            .map
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| OpError::UnknownOp(name.to_string()))?;

        let outcome = catch_unwind(AssertUnwindSafe(|| handler(args)));
        let value = match outcome {
            Ok(result) => result?,
            Err(payload) => {
                let msg = panic_text(&payload);
                warn!(op = name, panic = msg, "Op handler panicked");
                return Err(OpError::Failed(msg.to_string()));
            }
        };

        if value.get("ok").is_some() {
            Ok(value)
        } else {
            Ok(json!({ "ok": true, "result": value }))
        }
    }

    /// Dispatch with the flat string-error envelope, used by the C ABI
    /// surface and anything else outside the line protocol.
    pub fn dispatch(&self, name: &str, args: &Value) -> Value {
        match self.dispatch_result(name, args) {
            Ok(envelope) => envelope,
            Err(e) => {
                if matches!(e, OpError::UnknownOp(_)) {
                    warn!(op = name, "Unknown op");
                }
                json!({ "ok": false, "error": e.to_string() })
            }
        }
    }
}

impl std::fmt::Debug for OpRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpRegistry")
            .field("ops", &self.map.len())
            .finish()
    }
}

/// Registers the complete operation surface.
pub fn register_all(registry: &Arc<OpRegistry>, ctx: Arc<OpContext>) {
    core::register(registry, ctx.clone());
    numeric::register(registry, ctx.clone());
    stubs::register(registry, ctx);
    core::register_capabilities(registry);
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
