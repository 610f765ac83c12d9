//! Conversation messages.

use serde::{Deserialize, Serialize};

/// A tool invocation as requested by the model, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Model-assigned call id, echoed back on the tool result.
    pub id: String,
    pub name: String,
    /// Raw JSON arguments.
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }
}

impl std::fmt::Display for ToolCallRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

/// One entry of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    User {
        content: String,
    },
    Agent {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        call_id: String,
        tool_name: String,
        content: String,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Message::Agent {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn agent_with_calls(content: Option<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Message::Agent { content, tool_calls }
    }

    pub fn tool(call_id: &str, tool_name: &str, content: impl Into<String>) -> Self {
        Message::Tool {
            call_id: call_id.to_string(),
            tool_name: tool_name.to_string(),
            content: content.into(),
        }
    }

    /// Role label used in logs and the history endpoint.
    pub fn role(&self) -> &'static str {
        match self {
            Message::User { .. } => "user",
            Message::Agent { .. } => "agent",
            Message::Tool { .. } => "tool",
        }
    }

    /// Text content, if the message has any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Message::User { content } | Message::Tool { content, .. } => Some(content),
            Message::Agent { content, .. } => content.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_shape() {
        let msg = Message::agent_with_calls(
            None,
            vec![ToolCallRequest::new("call_1", "rag_search", r#"{"query":"vpn"}"#)],
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "agent");
        assert!(json.get("content").is_none());
        assert_eq!(json["tool_calls"][0]["name"], "rag_search");

        let back: Message = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_display_and_text() {
        let call = ToolCallRequest::new("c", "get_collections", "{}");
        assert_eq!(call.to_string(), "get_collections({})");
        assert_eq!(Message::tool("c", "get_collections", "docs").text(), Some("docs"));
        assert_eq!(Message::agent_with_calls(None, vec![call]).text(), None);
    }
}
