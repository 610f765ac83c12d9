//! Conversation state and its persistence between turns.

mod checkpoint;
mod message;

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore, SqliteCheckpointStore};
pub use message::{Message, ToolCallRequest};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered, append-only message history of one conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationState {
    thread_id: String,
    user_id: String,
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Start an empty conversation.
    pub fn new(thread_id: &str, user_id: &str) -> Self {
        Self {
            thread_id: thread_id.to_string(),
            user_id: user_id.to_string(),
            messages: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Append a message. The history is never rewritten.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.updated_at = Utc::now();
    }

    /// Last agent reply, if the conversation ended on one.
    pub fn last_reply(&self) -> Option<&str> {
        match self.messages.last() {
            Some(Message::Agent { content, tool_calls }) if tool_calls.is_empty() => {
                content.as_deref()
            }
            _ => None,
        }
    }

    /// Index of the first user message of the trailing block of user messages.
    ///
    /// Equals `len()` when the history does not end on a user message.
    pub fn turn_start(&self) -> usize {
        let trailing = self
            .messages
            .iter()
            .rev()
            .take_while(|m| matches!(m, Message::User { .. }))
            .count();
        self.messages.len() - trailing
    }

    /// Tail of the history to present to the model.
    ///
    /// Holds the last `max` messages (0 means all) but always everything from
    /// `keep_from` on. A window that would start on a tool result is widened back to
    /// the agent message that requested it.
    pub fn window(&self, max: usize, keep_from: usize) -> &[Message] {
        let len = self.messages.len();
        if max == 0 {
            return &self.messages;
        }

        let mut start = len.saturating_sub(max).min(keep_from.min(len));
        while start > 0 && start < len && matches!(self.messages[start], Message::Tool { .. }) {
            start -= 1;
        }
        &self.messages[start..]
    }

    /// Check that every agent tool request is answered, in order, by tool results.
    ///
    /// A trailing agent message with pending calls is allowed (a turn in progress).
    pub fn validate_tool_pairing(&self) -> std::result::Result<(), String> {
        let mut i = 0;
        while i < self.messages.len() {
            match &self.messages[i] {
                Message::Agent { tool_calls, .. } if !tool_calls.is_empty() => {
                    for (offset, call) in tool_calls.iter().enumerate() {
                        match self.messages.get(i + 1 + offset) {
                            None => return Ok(()),
                            Some(Message::Tool { call_id, .. }) if *call_id == call.id => {}
                            Some(other) => {
                                return Err(format!(
                                    "message {} should answer tool call '{}', found {}",
                                    i + 1 + offset,
                                    call.id,
                                    other.role()
                                ))
                            }
                        }
                    }
                    i += 1 + tool_calls.len();
                }
                Message::Tool { call_id, .. } => {
                    return Err(format!("tool result '{}' at {} has no request", call_id, i));
                }
                _ => i += 1,
            }
        }
        Ok(())
    }
}
