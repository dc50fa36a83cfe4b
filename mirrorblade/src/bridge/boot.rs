//! Boot-ops runner.
//!
//! An optional `config.json` next to the main config may carry an
//! `onLoad` array of request objects. After the RPC server is
//! listening, the orchestrator connects as an ordinary client and sends
//! each entry in order, best-effort reading one reply per entry.
//! Failures are logged and ignored.

use crate::config::file::boot_script_path;
use crate::rpc::client::RpcClient;
use crate::rpc::wire::PROTOCOL_VERSION;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Connection attempts against the freshly started server (~4 s total).
pub const CONNECT_ATTEMPTS: u32 = 40;

/// Delay between connection attempts.
pub const CONNECT_DELAY: Duration = Duration::from_millis(100);

/// Bound on waiting for each entry's reply.
pub const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// Loads and sends the boot script, if any.
pub async fn run_boot_ops(host_root: &Path, socket: &Path) {
    let script = boot_script_path(host_root);
    let text = match std::fs::read_to_string(&script) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %script.display(), "No boot script, skipping onLoad");
            return;
        }
        Err(e) => {
            warn!(path = %script.display(), error = %e, "Failed to read boot script");
            return;
        }
    };

    let doc: Value = match serde_json::from_str(&text) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(path = %script.display(), error = %e, "Boot script is not valid JSON");
            return;
        }
    };

    let Some(entries) = doc.get("onLoad").and_then(|v| v.as_array()) else {
        info!("Boot script has no onLoad array, nothing to do");
        return;
    };

    let mut client = match RpcClient::connect_retry(socket, CONNECT_ATTEMPTS, CONNECT_DELAY).await
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Boot ops: could not reach the RPC server, skipping onLoad");
            return;
        }
    };

    let mut sent = 0usize;
    for entry in entries {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        if !obj.contains_key("op") {
            continue;
        }

        let mut request = entry.clone();
        if request.get("v").is_none() {
            request["v"] = json!(PROTOCOL_VERSION);
        }

        if let Err(e) = client.send_only(&request).await {
            warn!(error = %e, "Boot op send failed, aborting remaining entries");
            return;
        }
        sent += 1;

        match client.read_reply_timeout(REPLY_TIMEOUT).await {
            Ok(reply) => debug!(reply = %reply, "Boot op reply"),
            Err(e) => debug!(error = %e, "Boot op reply not read"),
        }
    }

    info!(sent, "Boot ops processed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_script_is_a_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        // Must return quickly without touching the (nonexistent) socket.
        run_boot_ops(dir.path(), &dir.path().join("none.sock")).await;
    }

    #[tokio::test]
    async fn test_script_without_onload_is_a_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = boot_script_path(dir.path());
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, r#"{"other": 1}"#).unwrap();
        run_boot_ops(dir.path(), &dir.path().join("none.sock")).await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_noop() {
        let dir = tempfile::TempDir::new().unwrap();
        let script = boot_script_path(dir.path());
        std::fs::create_dir_all(script.parent().unwrap()).unwrap();
        std::fs::write(&script, "{nope").unwrap();
        run_boot_ops(dir.path(), &dir.path().join("none.sock")).await;
    }
}
