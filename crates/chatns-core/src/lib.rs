//! Core abstractions for the chatnsbot terminal client.
//!
//! This crate provides the fundamental building blocks:
//! - `Conversation` - Ordered user/assistant transcript
//! - `ChatArguments` / `ToolResult` - The chat tool's request and result contract
//! - `ToolGateway` - Seam between the conversation loop and the gateway connector
//! - `GatewayError` - Error taxonomy shared by every layer

pub mod completion;
pub mod conversation;
pub mod traits;

pub use completion::{ChatArguments, Completion, GenerationParams, ToolResult, Usage};
pub use conversation::{ChatMessage, Conversation, Role};
pub use traits::{Credentials, GatewayError, Session, ToolGateway};
