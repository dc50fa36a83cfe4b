//! The local-endpoint RPC server.
//!
//! One client at a time: create the endpoint, await a client, run the
//! session loop until disconnect, tear the endpoint down, repeat. Within
//! a session, requests are processed sequentially and replies are
//! written in request order.
//!
//! Framing violations (a line past the 1 MiB cap, non-UTF-8 bytes) end
//! the session without a reply; protocol violations (bad JSON, wrong
//! version, unknown op) produce an error reply and the session
//! continues.

use super::wire::{attach_meta, error_envelope, Request, MAX_LINE_BYTES};
use crate::config::store::ConfigStore;
use crate::ops::OpRegistry;
use futures::{SinkExt, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Backoff after a failed endpoint creation.
pub const BIND_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Poll interval while sessions are administratively disabled.
const DISABLED_POLL: Duration = Duration::from_millis(500);

/// The accept/session loop.
pub struct RpcServer {
    registry: Arc<OpRegistry>,
    store: Arc<ConfigStore>,
    socket_path: PathBuf,
}

impl RpcServer {
    pub fn new(registry: Arc<OpRegistry>, store: Arc<ConfigStore>, socket_path: PathBuf) -> Self {
        Self {
            registry,
            store,
            socket_path,
        }
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    /// Runs until `shutdown` is cancelled. The endpoint file is removed
    /// on every exit path.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(path = %self.socket_path.display(), "RPC server starting");

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            if !self.store.ipc_enabled() {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(DISABLED_POLL) => continue,
                }
            }

            // Stale socket files from an unclean exit block the bind.
            let _ = std::fs::remove_file(&self.socket_path);

            let listener = match UnixListener::bind(&self.socket_path) {
                Ok(listener) => listener,
                Err(e) => {
                    warn!(path = %self.socket_path.display(), error = %e, "Endpoint creation failed, retrying");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(BIND_RETRY_DELAY) => continue,
                    }
                }
            };

            let stream = tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, _addr)) => stream,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                },
            };

            info!("Client connected");
            self.session(stream, &shutdown).await;
            info!("Client disconnected");
            // Listener drops here; the endpoint is recreated for the
            // next client.
        }

        let _ = std::fs::remove_file(&self.socket_path);
        info!("RPC server stopped");
    }

    /// Processes one session until disconnect, framing violation, or
    /// shutdown.
    async fn session(&self, stream: UnixStream, shutdown: &CancellationToken) {
        let mut framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

        loop {
            let line = tokio::select! {
                _ = shutdown.cancelled() => return,
                next = framed.next() => match next {
                    None => return, // disconnect
                    Some(Ok(line)) => line,
                    Some(Err(e)) => {
                        // Oversized line or invalid UTF-8: terminate
                        // without a reply.
                        warn!(error = %e, "Session terminated on framing error");
                        return;
                    }
                },
            };

            let reply = self.handle_line(&line);
            if let Err(e) = framed.send(reply).await {
                warn!(error = %e, "Reply write failed, ending session");
                return;
            }
        }
    }

    /// Parses and dispatches one request line, producing the reply line.
    fn handle_line(&self, line: &str) -> String {
        let reply = match Request::parse_line(line) {
            Err(e) => {
                debug!(code = %e.code, msg = %e.msg, "Request rejected");
                attach_meta(error_envelope(e.code, &e.msg), e.v, e.id.as_ref())
            }
            Ok(req) => {
                let envelope = match self.registry.dispatch_result(&req.op, &req.args) {
                    Ok(envelope) => envelope,
                    Err(e) => error_envelope(e.code(), &e.to_string()),
                };
                attach_meta(envelope, req.v, req.id.as_ref())
            }
        };
        reply.to_string()
    }
}

impl std::fmt::Debug for RpcServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcServer")
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}
