//! Loader services: document-driven configuration of the numeric
//! services (compound values, impound deny-list, volumetric-phi).
//!
//! A load runs in two phases over every registered service: `configure`
//! stages state from the document, then `apply` commits it, so readers
//! never observe a half-loaded document.

pub mod compound;
pub mod impound;
pub mod volphi;

pub use compound::CompoundService;
pub use impound::{glob_match, ImpoundRule, ImpoundService};
pub use volphi::{VolPhiParams, VolPhiService};

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from file-backed loads. In-memory loads are infallible.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to read loader document: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse loader document: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Shared context passed to services during configuration.
pub struct LoaderContext<'a> {
    /// The caller-supplied environment document; numeric entries seed
    /// expression evaluation.
    pub base_env: &'a serde_json::Value,
}

impl LoaderContext<'_> {
    /// Numeric entries of the base environment.
    pub fn numeric_env(&self) -> std::collections::HashMap<String, f64> {
        crate::eval::expr::env_from_json(self.base_env)
    }
}

/// A named, document-configurable service.
pub trait LoaderService: Send + Sync {
    fn name(&self) -> &'static str;

    /// Stages state from the document. Must not affect live reads.
    fn configure(&self, cfg: &serde_json::Value, ctx: &LoaderContext<'_>);

    /// Commits staged state.
    fn apply(&self);

    /// Live state as JSON.
    fn snapshot(&self) -> serde_json::Value;

    /// Drops both staged and live state.
    fn reset(&self);
}

#[derive(Default)]
struct Registry {
    services: BTreeMap<&'static str, Arc<dyn LoaderService>>,
    last_config: serde_json::Value,
    last_env: serde_json::Value,
}

/// The service registry plus typed handles to the built-ins.
pub struct Loader {
    registry: Mutex<Registry>,
    compound: Arc<CompoundService>,
    impound: Arc<ImpoundService>,
    volphi: Arc<VolPhiService>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// Creates a loader with the built-in services registered.
    pub fn new() -> Self {
        let compound = Arc::new(CompoundService::new());
        let impound = Arc::new(ImpoundService::new());
        let volphi = Arc::new(VolPhiService::new());

        let loader = Self {
            registry: Mutex::new(Registry::default()),
            compound: compound.clone(),
            impound: impound.clone(),
            volphi: volphi.clone(),
        };
        loader.register(compound);
        loader.register(impound);
        loader.register(volphi);
        loader
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Registry> {
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self, service: Arc<dyn LoaderService>) {
        let name = service.name();
        self.lock().services.insert(name, service);
        debug!(service = name, "Loader service registered");
    }

    pub fn unregister(&self, name: &str) {
        self.lock().services.remove(name);
    }

    pub fn service_names(&self) -> Vec<&'static str> {
        self.lock().services.keys().copied().collect()
    }

    /// Typed handle to the compound service.
    pub fn compound(&self) -> &Arc<CompoundService> {
        &self.compound
    }

    /// Typed handle to the impound service.
    pub fn impound(&self) -> &Arc<ImpoundService> {
        &self.impound
    }

    /// Typed handle to the volumetric-phi service.
    pub fn volphi(&self) -> &Arc<VolPhiService> {
        &self.volphi
    }

    /// Configures every service from `config`, then applies every
    /// service. The configure pass completes before the first apply so a
    /// snapshot taken afterwards reflects exactly one document.
    pub fn load(&self, config: serde_json::Value, env: serde_json::Value) {
        let registry = self.lock();
        let ctx = LoaderContext { base_env: &env };
        for service in registry.services.values() {
            service.configure(&config, &ctx);
        }
        for service in registry.services.values() {
            service.apply();
        }
        drop(registry);

        let mut registry = self.lock();
        registry.last_config = config;
        registry.last_env = env;
        info!("Loader document applied");
    }

    /// Reads, parses, and loads a document from disk.
    pub fn load_file(&self, path: &Path, env: serde_json::Value) -> Result<(), LoaderError> {
        let text = std::fs::read_to_string(path)?;
        let config: serde_json::Value = serde_json::from_str(&text)?;
        self.load(config, env);
        Ok(())
    }

    /// Snapshot of every service keyed by name.
    pub fn snapshot_all(&self) -> serde_json::Value {
        let registry = self.lock();
        let mut out = serde_json::Map::new();
        for (name, service) in &registry.services {
            out.insert(name.to_string(), service.snapshot());
        }
        serde_json::Value::Object(out)
    }

    /// The most recently loaded document, for diagnostics.
    pub fn last_config(&self) -> serde_json::Value {
        self.lock().last_config.clone()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("services", &self.service_names())
            .finish()
    }
}
