//! Wire protocol for client-gateway communication.
//!
//! One JSON object per line in each direction. Requests carry an increasing
//! numeric `id`; the gateway answers with the same `id` and either `result`
//! or `error`. Anything else on the stream is a notification.

use chatns_core::{Credentials, Session};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// Gateway method names.
pub mod method {
    pub const CREATE_SESSION: &str = "mcp-manager/create-session";
    pub const DESTROY_SESSION: &str = "mcp-manager/destroy-session";
    pub const LIST_SESSIONS: &str = "mcp-manager/list-sessions";
    pub const LIST_SERVERS: &str = "mcp-manager/list-servers";
    pub const CALL_TOOL: &str = "tools/call";
}

/// Request from client to gateway.
#[derive(Debug, Clone, Serialize)]
pub struct RpcRequest<'a, P: Serialize> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P: Serialize> RpcRequest<'a, P> {
    #[must_use]
    pub const fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// Any line received from the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcResponse {
    /// Absent on notifications.
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Whether this line answers the request with the given id.
    #[must_use]
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }
}

/// Error object of a failed request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Params of `mcp-manager/create-session`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionParams<'a> {
    pub server_type: &'a str,
    pub credentials: &'a Credentials,
}

/// Result of `mcp-manager/create-session`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSession {
    pub session_id: String,
    #[serde(default)]
    pub server_type: Option<String>,
    #[serde(default)]
    pub created: Option<String>,
}

impl CreatedSession {
    /// Convert into a session handle, falling back to the requested provider name.
    #[must_use]
    pub fn into_session(self, requested_provider: &str) -> Session {
        Session {
            id: self.session_id,
            provider: self
                .server_type
                .unwrap_or_else(|| requested_provider.to_string()),
            created: self.created,
        }
    }
}

/// Params of requests addressed to one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionParams<'a> {
    pub session_id: &'a str,
}

/// Result of `mcp-manager/destroy-session`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DestroyedSession {
    #[serde(default)]
    pub destroyed: bool,
}

/// Params of `tools/call`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolParams<'a> {
    pub session_id: &'a str,
    pub name: &'a str,
    pub arguments: Value,
}

/// Result of `mcp-manager/list-sessions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionList {
    #[serde(default)]
    pub sessions: Vec<Value>,
}

/// Result of `mcp-manager/list-servers`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerList {
    #[serde(default)]
    pub servers: Vec<Value>,
    #[serde(default)]
    pub count: Option<u64>,
}

/// Empty params object.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct NoParams {}
