//! `call`: send one operation to a running sidecar.

use super::connect;
use crate::error::CliError;
use serde_json::{json, Value};
use std::path::Path;

pub struct CallArgs<'a> {
    pub root: &'a Path,
    pub pipe: Option<&'a str>,
    pub op: &'a str,
    pub args_json: Option<&'a str>,
    pub id: Option<&'a str>,
}

pub async fn run(args: CallArgs<'_>) -> Result<(), CliError> {
    let op_args: Value = match args.args_json {
        Some(text) => {
            let parsed: Value = serde_json::from_str(text)?;
            if !parsed.is_object() {
                return Err(CliError::Config("--args must be a JSON object".to_string()));
            }
            parsed
        }
        None => json!({}),
    };

    let mut request = json!({ "v": 1, "op": args.op, "args": op_args });
    if let Some(id) = args.id {
        request["id"] = json!(id);
    }

    let mut client = connect(args.root, args.pipe).await?;
    let reply = client.call_raw(&request).await?;
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}
