//! `diag`: fetch and pretty-print the diagnostic snapshot.

use super::connect;
use crate::error::CliError;
use serde_json::{json, Value};
use std::path::Path;

pub async fn run(root: &Path, pipe: Option<&str>) -> Result<(), CliError> {
    let mut client = connect(root, pipe).await?;
    let reply = client.call("diag.dump", json!({})).await?;

    // The snapshot arrives as a compact JSON string in `result`.
    match reply["result"].as_str() {
        Some(text) => {
            let doc: Value = serde_json::from_str(text)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        None => println!("{}", serde_json::to_string_pretty(&reply)?),
    }
    Ok(())
}
