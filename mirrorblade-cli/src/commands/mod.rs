//! Command implementations.

pub mod call;
pub mod config;
pub mod diag;
pub mod init;
pub mod serve;

use crate::error::CliError;
use mirrorblade::config::{config_path, load_from};
use mirrorblade::rpc::{socket_path, RpcClient};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resolves the endpoint for client commands: explicit `--pipe` wins,
/// otherwise the pipe name comes from the config under `root`.
pub fn resolve_socket(root: &Path, pipe_override: Option<&str>) -> PathBuf {
    match pipe_override {
        Some(pipe) => socket_path(pipe),
        None => {
            let cfg = load_from(&config_path(root));
            socket_path(&cfg.ipc_pipe_name)
        }
    }
}

/// Connects to a running sidecar with a short retry window.
pub async fn connect(root: &Path, pipe_override: Option<&str>) -> Result<RpcClient, CliError> {
    let socket = resolve_socket(root, pipe_override);
    Ok(RpcClient::connect_retry(&socket, 5, Duration::from_millis(100)).await?)
}
