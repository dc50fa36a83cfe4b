//! The orchestrator: owns every subsystem and wires them together.
//!
//! Bring-up order: config (load + apply runtime), registry, worker pool,
//! then the long-lived tasks (RPC server, config watcher, boot ops).
//! Logging is initialized by the host before `init` so config loading is
//! already observable. Shutdown runs in reverse: cancel the tasks, then
//! stop the pool.

pub mod boot;

use crate::config::file::{config_path, load_from};
use crate::config::store::ConfigStore;
use crate::config::watcher::ConfigWatcher;
use crate::ops::{register_all, OpContext, OpRegistry};
use crate::pool::{PoolConfig, PoolError, WorkerPool};
use crate::rpc::endpoint::socket_path;
use crate::rpc::server::RpcServer;
use crate::sinks::RuntimeSinks;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Fatal bring-up failures. Everything else degrades and logs.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("worker pool failed to start: {0}")]
    Pool(#[from] PoolError),
}

/// Bring-up options.
#[derive(Clone)]
pub struct BridgeOptions {
    /// Host root under which `r6/config/` lives.
    pub host_root: PathBuf,
    pub pool: PoolConfig,
    pub sinks: RuntimeSinks,
    /// Whether to send the sibling boot script after the server listens.
    pub run_boot_ops: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            host_root: PathBuf::from("."),
            pool: PoolConfig::default(),
            sinks: RuntimeSinks::disconnected(),
            run_boot_ops: true,
        }
    }
}

impl BridgeOptions {
    pub fn with_host_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.host_root = root.into();
        self
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_sinks(mut self, sinks: RuntimeSinks) -> Self {
        self.sinks = sinks;
        self
    }

    pub fn with_boot_ops(mut self, run: bool) -> Self {
        self.run_boot_ops = run;
        self
    }
}

/// The running sidecar.
pub struct Bridge {
    ctx: Arc<OpContext>,
    registry: Arc<OpRegistry>,
    socket: PathBuf,
    host_root: PathBuf,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    /// Brings every subsystem up. Must run inside a tokio runtime.
    pub async fn init(options: BridgeOptions) -> Result<Arc<Self>, BridgeError> {
        let config_path = config_path(&options.host_root);
        let cfg = load_from(&config_path);
        let store = Arc::new(ConfigStore::new(cfg.clone()));
        options.sinks.apply(&cfg);

        let registry = Arc::new(OpRegistry::new());
        let pool = WorkerPool::new(options.pool.clone());
        let ctx = OpContext::new(
            store.clone(),
            pool.clone(),
            options.sinks.clone(),
            config_path.clone(),
        );
        register_all(&registry, ctx.clone());
        info!(ops = registry.len(), "Operation registry populated");

        pool.start()?;

        let shutdown = CancellationToken::new();
        let socket = socket_path(&store.ipc_pipe_name());

        let mut tasks = Vec::new();

        let server = RpcServer::new(registry.clone(), store.clone(), socket.clone());
        tasks.push(tokio::spawn(server.run(shutdown.clone())));

        let watcher = ConfigWatcher::new(config_path, store, options.sinks.clone());
        tasks.push(tokio::spawn(watcher.run(shutdown.clone())));

        if options.run_boot_ops {
            let root = options.host_root.clone();
            let socket = socket.clone();
            tasks.push(tokio::spawn(async move {
                boot::run_boot_ops(&root, &socket).await;
            }));
        }

        info!(socket = %socket.display(), "Bridge initialized");
        Ok(Arc::new(Self {
            ctx,
            registry,
            socket,
            host_root: options.host_root,
            shutdown,
            tasks: Mutex::new(tasks),
        }))
    }

    /// Cancels the long-lived tasks, waits for them, then stops the
    /// pool. Idempotent; later calls find nothing left to tear down.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks: Vec<JoinHandle<()>> = {
            match self.tasks.lock() {
                Ok(mut guard) => guard.drain(..).collect(),
                Err(poisoned) => poisoned.into_inner().drain(..).collect(),
            }
        };
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Background task ended abnormally");
            }
        }

        // Worker joins block; keep them off the async workers.
        let pool = self.ctx.pool.clone();
        let _ = tokio::task::spawn_blocking(move || pool.stop()).await;

        info!("Bridge shut down");
    }

    /// Synchronous dispatch into the op table (the C ABI path).
    pub fn dispatch(&self, op: &str, args: &Value) -> Value {
        self.registry.dispatch(op, args)
    }

    /// Re-broadcasts the current config to the sinks.
    pub fn apply_runtime(&self) {
        self.ctx.sinks.apply(&self.ctx.store.snapshot());
    }

    pub fn ctx(&self) -> &Arc<OpContext> {
        &self.ctx
    }

    pub fn registry(&self) -> &Arc<OpRegistry> {
        &self.registry
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket
    }

    pub fn host_root(&self) -> &PathBuf {
        &self.host_root
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("socket", &self.socket)
            .field("host_root", &self.host_root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::file::save_to;
    use crate::config::settings::BridgeConfig;
    use serde_json::json;

    /// Each test gets a distinct pipe name so parallel tests never race
    /// on one socket path.
    fn options_in(dir: &tempfile::TempDir, pipe: &str) -> BridgeOptions {
        let mut cfg = BridgeConfig::default();
        cfg.ipc_pipe_name = format!("mb-bridge-test-{pipe}-{}", std::process::id());
        save_to(&config_path(dir.path()), &cfg).unwrap();

        BridgeOptions::default()
            .with_host_root(dir.path())
            .with_pool(PoolConfig::default().with_workers(2))
            .with_boot_ops(false)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_init_and_shutdown() {
        let dir = tempfile::TempDir::new().unwrap();
        let bridge = Bridge::init(options_in(&dir, "initshut")).await.unwrap();

        assert!(bridge.ctx().pool.is_running());
        assert!(bridge.registry().exists("ping"));

        bridge.shutdown().await;
        assert!(!bridge.ctx().pool.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dispatch_through_bridge() {
        let dir = tempfile::TempDir::new().unwrap();
        let bridge = Bridge::init(options_in(&dir, "dispatch")).await.unwrap();

        let reply = bridge.dispatch("ping", &json!({}));
        assert_eq!(reply["result"], "pong");

        let reply = bridge.dispatch("nope", &json!({}));
        assert_eq!(reply["ok"], false);

        bridge.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_socket_path_derives_from_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let bridge = Bridge::init(options_in(&dir, "sockpath")).await.unwrap();
        assert!(bridge
            .socket_path()
            .to_string_lossy()
            .contains("mb-bridge-test-sockpath"));
        bridge.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_is_idempotent() {
        let dir = tempfile::TempDir::new().unwrap();
        let bridge = Bridge::init(options_in(&dir, "idem")).await.unwrap();
        bridge.shutdown().await;
        bridge.shutdown().await;
    }
}
