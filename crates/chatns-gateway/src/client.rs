//! Gateway client.

use std::time::Duration;

use async_trait::async_trait;
use chatns_core::{Credentials, GatewayError, Session, ToolGateway};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader},
    net::TcpStream,
};

use crate::protocol::{
    CallToolParams, CreateSessionParams, CreatedSession, DestroyedSession, NoParams, RpcRequest,
    RpcResponse, ServerList, SessionList, SessionParams, method,
};

/// Port the gateway listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 8700;

/// Bound on connect and on every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Transport error.
#[derive(Debug, thiserror::Error)]
enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("gateway closed the connection")]
    Closed,
    #[error("request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("gateway error ({code}): {message}")]
    Rpc { code: i64, message: String },
}

impl TransportError {
    const fn is_connection_loss(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Closed)
    }
}

/// JSON-RPC client holding one gateway connection.
///
/// Exactly one request is outstanding at a time: each call writes its
/// request line and then reads until the reply carrying the same id
/// arrives. Notifications and stale replies are skipped.
pub struct GatewayClient<S = TcpStream> {
    stream: BufReader<S>,
    addr: String,
    next_id: u64,
    timeout: Duration,
}

impl GatewayClient<TcpStream> {
    /// Open a TCP connection to the gateway.
    ///
    /// # Errors
    /// Returns [`GatewayError::Connection`] if the gateway is unreachable or
    /// the connect does not complete within `timeout`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, GatewayError> {
        let addr = format!("{host}:{port}");
        let stream = match tokio::time::timeout(timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                return Err(GatewayError::Connection {
                    addr,
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                return Err(GatewayError::Connection {
                    addr,
                    reason: format!("connect timed out after {timeout:?}"),
                });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!("Failed to set TCP_NODELAY: {e}");
        }

        tracing::info!("Connected to gateway at {addr}");
        Ok(Self::from_stream(stream, addr, timeout))
    }
}

impl<S> GatewayClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already-connected stream.
    #[must_use]
    pub fn from_stream(stream: S, addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            stream: BufReader::new(stream),
            addr: addr.into(),
            next_id: 0,
            timeout,
        }
    }

    /// Address this client is connected to.
    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// List the sessions this connection owns on the gateway.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_sessions(&mut self) -> Result<Vec<Value>, GatewayError> {
        let list: SessionList = self
            .request(method::LIST_SESSIONS, NoParams::default())
            .await
            .map_err(|e| self.query_error(e))?;
        Ok(list.sessions)
    }

    /// List the tool servers configured on the gateway.
    ///
    /// # Errors
    /// Returns error if the request fails.
    pub async fn list_servers(&mut self) -> Result<ServerList, GatewayError> {
        self.request(method::LIST_SERVERS, NoParams::default())
            .await
            .map_err(|e| self.query_error(e))
    }

    async fn request<P, R>(&mut self, method: &str, params: P) -> Result<R, TransportError>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        self.next_id += 1;
        let id = self.next_id;
        let timeout = self.timeout;

        let result = tokio::time::timeout(timeout, self.exchange(id, method, params))
            .await
            .map_err(|_| TransportError::TimedOut(timeout))??;
        Ok(serde_json::from_value(result)?)
    }

    async fn exchange<P>(
        &mut self,
        id: u64,
        method: &str,
        params: P,
    ) -> Result<Value, TransportError>
    where
        P: Serialize + Send + Sync,
    {
        self.send_json(&RpcRequest::new(id, method, params)).await?;
        tracing::debug!("Sent request: {method} (id={id})");

        let mut line = String::new();
        loop {
            line.clear();
            if self.stream.read_line(&mut line).await? == 0 {
                return Err(TransportError::Closed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let response = match serde_json::from_str::<RpcResponse>(trimmed) {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!("Skipping unparseable line from gateway: {e}");
                    continue;
                }
            };
            if !response.answers(id) {
                tracing::debug!("Skipping notification: {trimmed}");
                continue;
            }

            if let Some(error) = response.error {
                return Err(TransportError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(response
                .result
                .unwrap_or_else(|| Value::Object(serde_json::Map::new())));
        }
    }

    async fn send_json<T: Serialize + Sync>(&mut self, message: &T) -> Result<(), TransportError> {
        let mut json = serde_json::to_string(message)?;
        json.push('\n');
        let stream = self.stream.get_mut();
        stream.write_all(json.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }

    fn connection_error(&self, e: &TransportError) -> GatewayError {
        GatewayError::Connection {
            addr: self.addr.clone(),
            reason: e.to_string(),
        }
    }

    fn query_error(&self, e: TransportError) -> GatewayError {
        if e.is_connection_loss() {
            self.connection_error(&e)
        } else {
            GatewayError::Invocation(e.to_string())
        }
    }
}

#[async_trait]
impl<S> ToolGateway for GatewayClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn create_session(
        &mut self,
        provider: &str,
        credentials: &Credentials,
    ) -> Result<Session, GatewayError> {
        let params = CreateSessionParams {
            server_type: provider,
            credentials,
        };
        let created: CreatedSession = match self.request(method::CREATE_SESSION, params).await {
            Ok(created) => created,
            Err(e) if e.is_connection_loss() => return Err(self.connection_error(&e)),
            Err(e) => return Err(GatewayError::Session(e.to_string())),
        };

        let session = created.into_session(provider);
        tracing::info!("Created session {} for {}", session.id, session.provider);
        Ok(session)
    }

    async fn call_tool(
        &mut self,
        session: &Session,
        tool_name: &str,
        arguments: Value,
    ) -> Result<Value, GatewayError> {
        let params = CallToolParams {
            session_id: &session.id,
            name: tool_name,
            arguments,
        };
        let result = self
            .request(method::CALL_TOOL, params)
            .await
            .map_err(|e| GatewayError::Invocation(e.to_string()))?;

        tracing::debug!("Tool call {tool_name} in session {} completed", session.id);
        Ok(result)
    }

    async fn destroy_session(&mut self, session: &Session) -> Result<bool, GatewayError> {
        let destroyed: DestroyedSession = self
            .request(
                method::DESTROY_SESSION,
                SessionParams {
                    session_id: &session.id,
                },
            )
            .await
            .map_err(|e| GatewayError::Session(e.to_string()))?;

        tracing::info!("Destroyed session {}", session.id);
        Ok(destroyed.destroyed)
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.stream.get_mut().shutdown().await {
            tracing::debug!("Failed to shut down gateway connection: {e}");
        }
        tracing::info!("Disconnected from gateway at {}", self.addr);
    }
}
