//! Gateway connector.
//!
//! Provides:
//! - Wire protocol (newline-delimited JSON-RPC 2.0)
//! - `GatewayClient` - one connection, one request in flight, implementing `ToolGateway`

pub mod client;
pub mod protocol;

pub use client::{DEFAULT_PORT, DEFAULT_TIMEOUT, GatewayClient};
pub use protocol::{RpcRequest, RpcResponse};
