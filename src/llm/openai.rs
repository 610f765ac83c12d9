//! OpenAI chat-completions model with tool calling.

use super::{LanguageModel, ModelReply, ToolSpec};
use crate::conversation::{Message, ToolCallRequest};
use crate::error::{RagChatError, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
    ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

const SERVICE: &str = "language model";

/// Chat model backed by the OpenAI API.
pub struct OpenAIChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIChatModel {
    pub fn new(client: Client<OpenAIConfig>, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }
}

fn build_error(e: impl std::fmt::Display) -> RagChatError {
    RagChatError::InvalidInput(format!("Failed to build chat request: {}", e))
}

/// Convert conversation history to request messages, system prompt first.
fn to_request_messages(
    system_prompt: &str,
    history: &[Message],
) -> Result<Vec<ChatCompletionRequestMessage>> {
    let mut messages: Vec<ChatCompletionRequestMessage> = Vec::with_capacity(history.len() + 1);

    if !system_prompt.is_empty() {
        messages.push(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(build_error)?
                .into(),
        );
    }

    for message in history {
        let converted: ChatCompletionRequestMessage = match message {
            Message::User { content } => ChatCompletionRequestUserMessageArgs::default()
                .content(content.as_str())
                .build()
                .map_err(build_error)?
                .into(),
            Message::Agent { content, tool_calls } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = content {
                    args.content(text.as_str());
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(
                        tool_calls
                            .iter()
                            .map(|call| ChatCompletionMessageToolCall {
                                id: call.id.clone(),
                                r#type: ChatCompletionToolType::Function,
                                function: FunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                args.build().map_err(build_error)?.into()
            }
            Message::Tool {
                call_id, content, ..
            } => ChatCompletionRequestToolMessageArgs::default()
                .tool_call_id(call_id.as_str())
                .content(content.as_str())
                .build()
                .map_err(build_error)?
                .into(),
        };
        messages.push(converted);
    }

    Ok(messages)
}

fn to_request_tools(tools: &[ToolSpec]) -> Vec<ChatCompletionTool> {
    tools
        .iter()
        .map(|tool| ChatCompletionTool {
            r#type: ChatCompletionToolType::Function,
            function: FunctionObject {
                name: tool.name.clone(),
                description: Some(tool.description.clone()),
                parameters: Some(tool.parameters.clone()),
                strict: None,
            },
        })
        .collect()
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    #[instrument(skip_all, fields(model = %self.model, messages = history.len()))]
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[Message],
        tools: &[ToolSpec],
    ) -> Result<ModelReply> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(to_request_messages(system_prompt, history)?);
        if !tools.is_empty() {
            request.tools(to_request_tools(tools));
        }
        let request = request.build().map_err(build_error)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RagChatError::unavailable(SERVICE, e))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagChatError::unavailable(SERVICE, "no choices in response"))?;

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        debug!("Model replied with {} tool call(s)", tool_calls.len());

        Ok(ModelReply {
            content: choice.message.content,
            tool_calls,
        })
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_conversion_keeps_order_and_ids() {
        let history = vec![
            Message::user("what collections exist?"),
            Message::agent_with_calls(
                None,
                vec![ToolCallRequest::new("call_1", "get_collections", "{}")],
            ),
            Message::tool("call_1", "get_collections", "docs"),
            Message::agent("There is one collection: docs."),
        ];

        let messages = to_request_messages("be brief", &history).unwrap();
        assert_eq!(messages.len(), 5);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));

        match &messages[2] {
            ChatCompletionRequestMessage::Assistant(a) => {
                let calls = a.tool_calls.as_ref().unwrap();
                assert_eq!(calls[0].id, "call_1");
                assert_eq!(calls[0].function.name, "get_collections");
            }
            other => panic!("expected assistant message, got {:?}", other),
        }
        match &messages[3] {
            ChatCompletionRequestMessage::Tool(t) => assert_eq!(t.tool_call_id, "call_1"),
            other => panic!("expected tool message, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let messages = to_request_messages("", &[Message::user("hi")]).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_tool_conversion() {
        let tools = to_request_tools(&[ToolSpec {
            name: "get_collections".into(),
            description: "List collections".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }]);
        assert_eq!(tools[0].function.name, "get_collections");
        assert!(tools[0].function.parameters.is_some());
    }
}
