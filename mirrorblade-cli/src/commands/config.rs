//! `config`: inspect or mutate sidecar configuration.

use super::connect;
use crate::error::CliError;
use mirrorblade::config::{config_path, load_from};
use serde_json::json;
use std::path::Path;

pub fn path(root: &Path) -> Result<(), CliError> {
    println!("{}", config_path(root).display());
    Ok(())
}

pub fn show(root: &Path) -> Result<(), CliError> {
    let cfg = load_from(&config_path(root));
    println!("{}", cfg.to_json_string());
    Ok(())
}

/// Reads one key through a running sidecar (live values, not the file).
pub async fn get(root: &Path, pipe: Option<&str>, key: &str) -> Result<(), CliError> {
    let mut client = connect(root, pipe).await?;
    let reply = client.call("config.get", json!({ "key": key })).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

/// Writes one key through a running sidecar and persists it.
pub async fn set(root: &Path, pipe: Option<&str>, key: &str, value: &str) -> Result<(), CliError> {
    // Values parse as JSON when possible, otherwise as a bare string, so
    // `config set traffic_boost 2.5` and `config set log_level warn`
    // both do the expected thing.
    let value: serde_json::Value =
        serde_json::from_str(value).unwrap_or_else(|_| json!(value));

    let mut client = connect(root, pipe).await?;
    let reply = client
        .call("config.set", json!({ "key": key, "value": value }))
        .await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);

    let save = client.call("config.save", json!({})).await?;
    if save["ok"] != json!(true) {
        eprintln!("warning: change applied but not persisted: {save}");
    }
    Ok(())
}
