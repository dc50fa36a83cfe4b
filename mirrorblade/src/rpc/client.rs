//! Line-protocol client for the local endpoint.
//!
//! Used by the boot-ops runner and the CLI `call` command. One request,
//! one reply, in order.

use super::wire::{MAX_LINE_BYTES, PROTOCOL_VERSION};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UnixStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};

#[derive(Debug, Error)]
pub enum RpcClientError {
    #[error("connect failed: {0}")]
    Connect(std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] LinesCodecError),

    #[error("server closed the session")]
    Disconnected,

    #[error("reply was not valid JSON: {0}")]
    BadReply(#[from] serde_json::Error),

    #[error("timed out waiting for a reply")]
    Timeout,
}

/// A connected client session.
pub struct RpcClient {
    framed: Framed<UnixStream, LinesCodec>,
}

impl RpcClient {
    /// Connects to the endpoint at `path`.
    pub async fn connect(path: &Path) -> Result<Self, RpcClientError> {
        let stream = UnixStream::connect(path)
            .await
            .map_err(RpcClientError::Connect)?;
        Ok(Self {
            framed: Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES)),
        })
    }

    /// Connects with retries, for racing a server that is still binding.
    pub async fn connect_retry(
        path: &Path,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, RpcClientError> {
        let mut last = None;
        for _ in 0..attempts.max(1) {
            match Self::connect(path).await {
                Ok(client) => return Ok(client),
                Err(e) => last = Some(e),
            }
            tokio::time::sleep(delay).await;
        }
        Err(last.unwrap_or(RpcClientError::Disconnected))
    }

    /// Sends a raw request object and reads one reply line.
    pub async fn call_raw(&mut self, request: &Value) -> Result<Value, RpcClientError> {
        self.framed.send(request.to_string()).await?;
        self.read_reply().await
    }

    /// Sends `{v:1, op, args}` and reads the reply.
    pub async fn call(&mut self, op: &str, args: Value) -> Result<Value, RpcClientError> {
        self.call_raw(&json!({ "v": PROTOCOL_VERSION, "op": op, "args": args }))
            .await
    }

    /// Reads one reply line, bounded by `timeout`.
    pub async fn read_reply_timeout(&mut self, timeout: Duration) -> Result<Value, RpcClientError> {
        match tokio::time::timeout(timeout, self.read_reply()).await {
            Ok(result) => result,
            Err(_) => Err(RpcClientError::Timeout),
        }
    }

    async fn read_reply(&mut self) -> Result<Value, RpcClientError> {
        match self.framed.next().await {
            None => Err(RpcClientError::Disconnected),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(line)) => Ok(serde_json::from_str(&line)?),
        }
    }

    /// Sends without waiting for the reply (paired with
    /// [`read_reply_timeout`] for best-effort exchanges).
    pub async fn send_only(&mut self, request: &Value) -> Result<(), RpcClientError> {
        self.framed.send(request.to_string()).await?;
        Ok(())
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}
