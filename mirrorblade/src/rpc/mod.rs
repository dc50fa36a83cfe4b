//! RPC transport: wire format, endpoint mapping, server, and client.

pub mod client;
pub mod endpoint;
pub mod server;
pub mod wire;

pub use client::{RpcClient, RpcClientError};
pub use endpoint::{sanitize_pipe_name, socket_path};
pub use server::{RpcServer, BIND_RETRY_DELAY};
pub use wire::{ErrorCode, Request, WireError, MAX_LINE_BYTES, PROTOCOL_VERSION};
