//! Agent system for answering conversation turns with tool calling.
//!
//! Provides an LLM agent that searches and maintains document collections
//! through the retrieval tools while answering a user message.

mod runner;

pub use runner::{Agent, AgentResponse, ToolCallRecord, DEFAULT_SYSTEM_PROMPT};
