//! MirrorBlade sidecar - local control plane for an embedding host.
//!
//! Exposes a host process to external tooling over a line-delimited
//! JSON-RPC channel on a local endpoint. Work submitted by operations
//! lands on a prioritized four-lane worker pool; a hot-reload config
//! subsystem keeps runtime toggles synchronized with the on-disk file;
//! deterministic numeric evaluators back the math-flavored operations.
//!
//! # High-Level API
//!
//! The [`bridge`] module provides the orchestrated entry point:
//!
//! ```ignore
//! use mirrorblade::bridge::{Bridge, BridgeOptions};
//!
//! let bridge = Bridge::init(BridgeOptions::default()).await?;
//! // ... serve until shutdown ...
//! bridge.shutdown().await;
//! ```
//!
//! Embedders without a runtime of their own use the C ABI in [`ffi`].

pub mod bridge;
pub mod config;
pub mod diagnostics;
pub mod eval;
pub mod ffi;
pub mod guards;
pub mod loader;
pub mod logging;
pub mod ops;
pub mod pool;
pub mod rpc;
pub mod sinks;
pub mod telemetry;

/// Version of the library and CLI, injected from the workspace manifest.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
