//! Model capability seam: request/response types and the backend trait.

pub mod gemini;

pub use gemini::GeminiBackend;

use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One model-facing conversation turn.
///
/// `User`/`Assistant` turns come from persisted history plus the current
/// batch; `ToolCall`/`ToolResult` pairs exist only within a single cycle and
/// are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatTurn {
    User { text: String },
    Assistant { text: String },
    ToolCall { name: String, args: serde_json::Value },
    ToolResult { name: String, output: String },
}

/// Model-facing description of an invokable tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema object describing the tool's arguments.
    pub parameters: serde_json::Value,
}

/// A single completion request: persona, prior turns, and visible tools.
///
/// The final turn in `turns` is the user text being answered.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_instruction: String,
    pub turns: Vec<ChatTurn>,
    pub tools: Vec<ToolSchema>,
}

/// What the model answered with.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCall {
        name: String,
        args: serde_json::Value,
    },
}

/// Completion backend capability.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<ModelReply, LlmError>;
}
