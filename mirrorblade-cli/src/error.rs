//! Centralized CLI error handling with user-facing messages.

use mirrorblade::bridge::BridgeError;
use mirrorblade::config::ConfigFileError;
use mirrorblade::rpc::RpcClientError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to write config: {0}")]
    ConfigFile(#[from] ConfigFileError),

    #[error("failed to start the sidecar: {0}")]
    Bridge(#[from] BridgeError),

    #[error("RPC call failed: {0}")]
    Rpc(#[from] RpcClientError),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Prints the error and exits with a failure status.
    pub fn exit(self) -> ! {
        eprintln!("error: {self}");
        if let CliError::Rpc(RpcClientError::Connect(_)) = self {
            eprintln!("hint: is the sidecar running? Start it with `mirrorblade serve`.");
        }
        std::process::exit(1);
    }
}
