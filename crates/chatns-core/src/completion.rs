//! Chat completion tool contract.
//!
//! The request side is [`ChatArguments`]. The result side is normalized into
//! [`ToolResult`] from any of the shapes the provider may answer with:
//!
//! - a bare chat result: `{"status": "success", "response": "...", "usage": {...}}`
//! - an MCP content envelope: `{"content": [{"type": "text", "text": "..."}], "isError": false}`
//!   whose text is either one of the JSON shapes here or plain reply text
//! - an OpenAI-style completion: `{"choices": [{"message": {"content": "..."}}]}`
//!
//! Only the reply text ever reaches the transcript; other fields are kept for
//! logging and ignored if unknown.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{ChatMessage, GatewayError};

/// Name of the chat tool exposed by the provider.
pub const CHAT_TOOL: &str = "chat_completion";

/// Default logical model identifier.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Default output length cap.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Generation parameters fixed for the lifetime of a chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

/// Arguments of one `chat_completion` call.
#[derive(Debug, Clone, Serialize)]
pub struct ChatArguments<'a> {
    /// Full transcript, oldest first.
    pub messages: &'a [ChatMessage],
    pub model: &'a str,
    pub temperature: f64,
    pub max_tokens: u32,
}

impl<'a> ChatArguments<'a> {
    #[must_use]
    pub fn new(messages: &'a [ChatMessage], params: &'a GenerationParams) -> Self {
        Self {
            messages,
            model: &params.model,
            temperature: params.temperature,
            max_tokens: params.max_tokens,
        }
    }

    /// Encode as the tool's argument mapping.
    ///
    /// # Errors
    /// Returns [`GatewayError::Invocation`] if a float is not representable in JSON.
    pub fn to_value(&self) -> Result<Value, GatewayError> {
        serde_json::to_value(self)
            .map_err(|e| GatewayError::Invocation(format!("cannot encode arguments: {e}")))
    }
}

/// Token accounting reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// A successful completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Reply text, the only part shown to the user.
    pub text: String,
    /// Model name echoed by the provider.
    pub model: Option<String>,
    pub usage: Option<Usage>,
}

impl Completion {
    fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            usage: None,
        }
    }
}

/// Normalized tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResult {
    Success(Completion),
    Failure { message: String },
}

impl ToolResult {
    /// Interpret a raw `tools/call` result.
    ///
    /// # Errors
    /// Returns [`GatewayError::MalformedResponse`] if no reply text or failure
    /// marker can be found.
    pub fn from_value(value: &Value) -> Result<Self, GatewayError> {
        if let Some(content) = value.get("content") {
            return Self::from_envelope(value, content);
        }
        Self::from_payload(value)
    }

    /// Turn a failure into [`GatewayError::Invocation`], surfacing the remote text.
    ///
    /// # Errors
    /// Returns the failure message as an invocation error.
    pub fn into_completion(self) -> Result<Completion, GatewayError> {
        match self {
            Self::Success(completion) => Ok(completion),
            Self::Failure { message } => Err(GatewayError::Invocation(message)),
        }
    }

    fn from_envelope(value: &Value, content: &Value) -> Result<Self, GatewayError> {
        let first_text = content
            .as_array()
            .and_then(|items| items.iter().find_map(|item| item.get("text")))
            .and_then(Value::as_str);

        let is_error = value.get("isError").and_then(Value::as_bool).unwrap_or(false);
        if is_error {
            return Ok(Self::Failure {
                message: first_text.unwrap_or("tool reported an error").to_string(),
            });
        }

        let text = first_text.ok_or_else(|| {
            GatewayError::MalformedResponse("content envelope carries no text item".into())
        })?;

        match serde_json::from_str::<Value>(text) {
            Ok(inner @ Value::Object(_)) => Self::from_payload(&inner),
            // Plain text (or a bare JSON scalar) is the reply itself.
            _ => Ok(Self::Success(Completion::text_only(text))),
        }
    }

    fn from_payload(value: &Value) -> Result<Self, GatewayError> {
        if !value.is_object() {
            return Err(GatewayError::MalformedResponse(format!(
                "expected an object, got {}",
                kind_of(value)
            )));
        }

        if let Some(status) = value.get("status").and_then(Value::as_str) {
            if status != "success" {
                let message = value
                    .get("error")
                    .or_else(|| value.get("message"))
                    .and_then(Value::as_str)
                    .map_or_else(
                        || format!("provider returned status \"{status}\""),
                        str::to_string,
                    );
                return Ok(Self::Failure { message });
            }
        }

        if let Some(response) = value.get("response") {
            let text = response.as_str().ok_or_else(|| {
                GatewayError::MalformedResponse("\"response\" is not a string".into())
            })?;
            return Ok(Self::Success(Completion {
                text: text.to_string(),
                model: value.get("model").and_then(Value::as_str).map(str::to_string),
                usage: value
                    .get("usage")
                    .and_then(|u| serde_json::from_value(u.clone()).ok()),
            }));
        }

        if let Some(choices) = value.get("choices") {
            let text = choices
                .get(0)
                .and_then(|c| c.pointer("/message/content"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    GatewayError::MalformedResponse("first choice has no message content".into())
                })?;
            return Ok(Self::Success(Completion {
                text: text.to_string(),
                model: value.get("model").and_then(Value::as_str).map(str::to_string),
                usage: value
                    .get("usage")
                    .and_then(|u| serde_json::from_value(u.clone()).ok()),
            }));
        }

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Ok(Self::Failure {
                message: error.to_string(),
            });
        }

        Err(GatewayError::MalformedResponse(
            "result has no \"response\" field".into(),
        ))
    }
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
