//! Gateway seam and error taxonomy.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Environment-style secrets injected into the provider's process.
///
/// Ordered so the wire encoding is stable.
pub type Credentials = BTreeMap<String, String>;

/// Handle to one conversation context with a tool provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque identifier assigned by the gateway.
    pub id: String,
    /// Logical name of the tool provider backing this session.
    pub provider: String,
    /// Creation timestamp as reported by the gateway.
    pub created: Option<String>,
}

/// Gateway error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error(
        "Cannot reach the gateway at {addr}: {reason}. \
         Make sure the gateway is running and listening on that port."
    )]
    Connection { addr: String, reason: String },
    #[error("Session error: {0}")]
    Session(String),
    #[error("Tool invocation failed: {0}")]
    Invocation(String),
    #[error("Malformed tool result: {0}")]
    MalformedResponse(String),
}

impl GatewayError {
    /// Whether this error ends the process when it happens during startup.
    #[must_use]
    pub const fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Session(_))
    }
}

/// Operations the conversation loop needs from a gateway connection.
///
/// Implementations hold exactly one connection and are driven by a single
/// task, hence `&mut self` and no interior locking.
#[async_trait]
pub trait ToolGateway: Send {
    /// Create a session against the named provider.
    async fn create_session(
        &mut self,
        provider: &str,
        credentials: &Credentials,
    ) -> Result<Session, GatewayError>;

    /// Call a named tool inside a session and return its raw result.
    async fn call_tool(
        &mut self,
        session: &Session,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, GatewayError>;

    /// Tear a session down. Returns whether the gateway reported it destroyed.
    async fn destroy_session(&mut self, session: &Session) -> Result<bool, GatewayError>;

    /// Release the underlying connection.
    async fn disconnect(&mut self) {}
}
