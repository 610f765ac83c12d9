//! Language model abstraction used by the agent loop.

mod openai;

pub use openai::OpenAIChatModel;

use crate::conversation::{Message, ToolCallRequest};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;

/// A tool as declared to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: serde_json::Value,
}

/// What the model produced for one generate step.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    /// A final answer with no tool requests.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    /// A reply requesting tool calls.
    pub fn calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A chat model that can request tool calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Produce the next agent message for `history`, optionally requesting tools.
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply>;

    /// Model identifier, for logs.
    fn name(&self) -> &str;
}
