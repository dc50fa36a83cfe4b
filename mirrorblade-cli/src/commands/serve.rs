//! `serve`: run the sidecar in the foreground until interrupted.

use crate::error::CliError;
use mirrorblade::bridge::{Bridge, BridgeOptions};
use mirrorblade::config::{config_path, load_from};
use mirrorblade::logging::{default_log_dir, init_logging};
use mirrorblade::pool::PoolConfig;
use mirrorblade::sinks::RuntimeSinks;
use std::path::Path;
use std::sync::Arc;

pub struct ServeArgs<'a> {
    pub root: &'a Path,
    pub workers: Option<usize>,
    pub no_drain: bool,
    pub no_boot: bool,
}

pub async fn run(args: ServeArgs<'_>) -> Result<(), CliError> {
    // Logger first so config loading is already observable.
    let cfg = load_from(&config_path(args.root));
    let (guard, level_handle) = init_logging(default_log_dir(), cfg.log_level)
        .map_err(|e| CliError::Config(format!("logging init failed: {e}")))?;

    let mut pool = PoolConfig::default();
    if let Some(workers) = args.workers {
        pool = pool.with_workers(workers);
    }
    if args.no_drain {
        pool = pool.with_drain_on_stop(false);
    }

    let sinks = RuntimeSinks {
        log: Arc::new(level_handle),
        ..RuntimeSinks::disconnected()
    };

    let options = BridgeOptions::default()
        .with_host_root(args.root)
        .with_pool(pool)
        .with_sinks(sinks)
        .with_boot_ops(!args.no_boot);

    let bridge = Bridge::init(options).await?;

    println!("MirrorBlade sidecar v{}", mirrorblade::VERSION);
    println!("Endpoint: {}", bridge.socket_path().display());
    println!("Config:   {}", config_path(args.root).display());
    println!();
    println!("Press Ctrl+C to stop");

    tokio::signal::ctrl_c().await?;
    println!();
    println!("Shutting down...");
    bridge.shutdown().await;
    drop(guard);
    Ok(())
}
