//! Agent runner: a generate / dispatch-tools state machine over one conversation turn.

use crate::config::AgentSettings;
use crate::conversation::{ConversationState, Message, ToolCallRequest};
use crate::error::{RagChatError, Result};
use crate::llm::LanguageModel;
use crate::tools::ToolDispatcher;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default system prompt for the agent.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant that answers questions about internal documentation.

You have tools to search document collections, create collections, add documents and chunk PDF files.

Guidelines:
- Use 'get_collections' if you do not know which collections exist
- Use 'rag_search' to find passages before answering questions about documentation
- Use 'pdf_chunker' to split a PDF, then 'add_documents' to store the chunks
- Answer only from retrieved passages; say so when nothing relevant was found

Keep answers concise and cite the passages you relied on."#;

enum LoopState {
    Generate,
    DispatchTools(Vec<ToolCallRequest>),
    Done(String),
}

/// Agent that answers one user turn, calling tools as the model requests.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolDispatcher>,
    system_prompt: String,
    max_iterations: usize,
    history_window: usize,
    parallel_tool_calls: bool,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Arc<ToolDispatcher>) -> Self {
        Self {
            model,
            tools,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            history_window: 40,
            parallel_tool_calls: true,
        }
    }

    pub fn from_settings(
        model: Arc<dyn LanguageModel>,
        tools: Arc<ToolDispatcher>,
        settings: &AgentSettings,
    ) -> Self {
        Self::new(model, tools)
            .with_system_prompt(&settings.system_prompt)
            .with_max_iterations(settings.max_iterations)
            .with_history_window(settings.history_window)
            .with_parallel_tool_calls(settings.parallel_tool_calls)
    }

    /// Set a custom system prompt.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    /// Set the maximum number of tool-dispatch cycles per turn.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    /// Number of earlier messages shown to the model. The current turn is always
    /// shown in full; 0 shows everything.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_parallel_tool_calls(mut self, parallel: bool) -> Self {
        self.parallel_tool_calls = parallel;
        self
    }

    /// Run the loop until the model answers without requesting tools.
    ///
    /// The caller appends the user message first. Messages produced along the way are
    /// pushed onto `state`; on error the state may hold a partial turn and should be
    /// discarded.
    #[instrument(skip_all, fields(thread = state.thread_id(), model = self.model.name()))]
    pub async fn run(&self, state: &mut ConversationState) -> Result<AgentResponse> {
        let turn_start = state.turn_start();
        let mut step = LoopState::Generate;
        let mut generations = 0;
        let mut dispatches = 0;
        let mut records = Vec::new();

        loop {
            step = match step {
                LoopState::Generate => {
                    generations += 1;
                    debug!("Generate step {}", generations);

                    let reply = self
                        .model
                        .generate(
                            &self.system_prompt,
                            state.window(self.history_window, turn_start),
                            self.tools.specs(),
                        )
                        .await?;

                    if reply.wants_tools() {
                        if dispatches == self.max_iterations {
                            return Err(RagChatError::ToolLoopExceeded {
                                max: self.max_iterations,
                            });
                        }
                        state.push(Message::agent_with_calls(
                            reply.content,
                            reply.tool_calls.clone(),
                        ));
                        LoopState::DispatchTools(reply.tool_calls)
                    } else {
                        let text = reply.content.unwrap_or_default();
                        state.push(Message::agent(text.clone()));
                        LoopState::Done(text)
                    }
                }
                LoopState::DispatchTools(requests) => {
                    dispatches += 1;
                    for request in &requests {
                        info!("Agent calling tool: {}", request);
                    }

                    let outcomes = self
                        .tools
                        .dispatch_all(&requests, self.parallel_tool_calls)
                        .await;
                    for outcome in outcomes {
                        state.push(outcome.to_message());
                        records.push(ToolCallRecord {
                            name: outcome.request.name.clone(),
                            arguments: outcome.request.arguments.clone(),
                            result: outcome.content(),
                            success: outcome.is_ok(),
                        });
                    }
                    LoopState::Generate
                }
                LoopState::Done(content) => {
                    info!(
                        "Turn finished after {} generate step(s), {} tool call(s)",
                        generations,
                        records.len()
                    );
                    return Ok(AgentResponse {
                        content,
                        tool_calls: records,
                        iterations: generations,
                    });
                }
            };
        }
    }
}

/// Response from an agent run.
#[derive(Debug, Clone, Serialize)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during the turn.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of generate steps (model calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ToolCallRecord {
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Text returned to the model.
    pub result: String,
    pub success: bool,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;
    use crate::llm::ModelReply;
    use crate::test_support::{HashEmbedder, ScriptedModel};
    use crate::tools::ToolContext;
    use crate::vector_store::MemoryVectorStore;

    fn dispatcher() -> Arc<ToolDispatcher> {
        let context = ToolContext::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(16)),
            ToolSettings::default(),
        );
        Arc::new(ToolDispatcher::new(context).unwrap())
    }

    fn state_with(question: &str) -> ConversationState {
        let mut state = ConversationState::new("t1", "u1");
        state.push(Message::user(question));
        state
    }

    #[tokio::test]
    async fn test_answer_without_tools_is_one_step() {
        let model = Arc::new(ScriptedModel::new(vec![ModelReply::text("Hello!")]));
        let agent = Agent::new(model.clone(), dispatcher());
        let mut state = state_with("hi");

        let response = agent.run(&mut state).await.unwrap();
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.iterations, 1);
        assert!(response.tool_calls.is_empty());
        assert_eq!(model.calls(), 1);
        assert_eq!(state.len(), 2);
        assert_eq!(state.last_reply(), Some("Hello!"));
    }

    #[tokio::test]
    async fn test_one_tool_message_per_request_in_order() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply::calls(vec![
                ToolCallRequest::new("c1", "create_collection", r#"{"name": "hr"}"#),
                ToolCallRequest::new("c2", "get_collections", "{}"),
            ]),
            ModelReply::text("Created hr."),
        ]));
        let agent = Agent::new(model.clone(), dispatcher()).with_parallel_tool_calls(false);
        let mut state = state_with("make an hr collection");

        let response = agent.run(&mut state).await.unwrap();
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls.len(), 2);
        assert!(response.tool_calls.iter().all(|r| r.success));
        assert!(response.tool_calls[1].result.contains("- hr"));

        let roles: Vec<&str> = state.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec!["user", "agent", "tool", "tool", "agent"]);
        assert!(matches!(&state.messages()[2], Message::Tool { call_id, .. } if call_id == "c1"));
        assert!(matches!(&state.messages()[3], Message::Tool { call_id, .. } if call_id == "c2"));
        assert!(state.validate_tool_pairing().is_ok());

        // the second generate step saw the tool results
        assert_eq!(model.seen()[1].len(), 4);
    }

    #[tokio::test]
    async fn test_endless_tool_requests_hit_the_guard() {
        let model = Arc::new(ScriptedModel::always_calling(ToolCallRequest::new(
            "loop",
            "get_collections",
            "{}",
        )));
        let agent = Agent::new(model.clone(), dispatcher());
        let mut state = state_with("loop forever");

        let err = agent.run(&mut state).await.unwrap_err();
        assert!(matches!(err, RagChatError::ToolLoopExceeded { max: 10 }));
        assert_eq!(model.calls(), 11);
    }

    #[tokio::test]
    async fn test_zero_iterations_allows_only_direct_answers() {
        let model = Arc::new(ScriptedModel::always_calling(ToolCallRequest::new(
            "c",
            "get_collections",
            "{}",
        )));
        let agent = Agent::new(model.clone(), dispatcher()).with_max_iterations(0);
        let err = agent.run(&mut state_with("x")).await.unwrap_err();
        assert!(matches!(err, RagChatError::ToolLoopExceeded { max: 0 }));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_tool_errors_are_fed_back() {
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply::calls(vec![
                ToolCallRequest::new("c1", "drop_database", "{}"),
                ToolCallRequest::new("c2", "rag_search", r#"{"query": "q", "collection": "none"}"#),
            ]),
            ModelReply::text("Sorry, I could not find that."),
        ]));
        let agent = Agent::new(model, dispatcher());
        let mut state = state_with("search");

        let response = agent.run(&mut state).await.unwrap();
        assert_eq!(response.content, "Sorry, I could not find that.");
        assert!(response.tool_calls.iter().all(|r| !r.success));
        for message in &state.messages()[2..4] {
            assert!(message.text().unwrap().starts_with("Error: "));
        }
    }

    #[tokio::test]
    async fn test_model_outage_is_fatal() {
        let model = Arc::new(ScriptedModel::from_results(vec![Err(RagChatError::unavailable(
            "language model",
            "connection refused",
        ))]));
        let agent = Agent::new(model, dispatcher());
        let err = agent.run(&mut state_with("hi")).await.unwrap_err();
        assert!(err.is_fatal_to_turn());
    }

    #[tokio::test]
    async fn test_history_window_limits_model_input() {
        let model = Arc::new(ScriptedModel::new(vec![ModelReply::text("ok")]));
        let agent = Agent::new(model.clone(), dispatcher()).with_history_window(3);
        let mut state = ConversationState::new("t", "u");
        for i in 0..10 {
            state.push(Message::user(format!("q{}", i)));
            state.push(Message::agent(format!("a{}", i)));
        }
        state.push(Message::user("latest"));

        agent.run(&mut state).await.unwrap();
        let seen = &model.seen()[0];
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].text(), Some("latest"));
    }

    #[tokio::test]
    async fn test_window_never_hides_the_question_or_tool_results() {
        let lookup = || ToolCallRequest::new("c", "get_collections", "{}");
        let model = Arc::new(ScriptedModel::new(vec![
            ModelReply::calls(vec![lookup(), lookup(), lookup()]),
            ModelReply::calls(vec![lookup()]),
            ModelReply::text("No collections yet."),
        ]));
        let agent = Agent::new(model.clone(), dispatcher()).with_history_window(3);
        let mut state = ConversationState::new("t", "u");
        for i in 0..5 {
            state.push(Message::user(format!("q{}", i)));
            state.push(Message::agent(format!("a{}", i)));
        }
        state.push(Message::user("which collections exist?"));

        agent.run(&mut state).await.unwrap();
        let seen = model.seen();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].len(), 3);
        for history in &seen[1..] {
            assert_eq!(history[0].text(), Some("which collections exist?"));
            assert!(matches!(history.last(), Some(Message::Tool { .. })));
        }
        assert_eq!(seen[1].len(), 5);
        assert_eq!(seen[2].len(), 7);
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "rag_search".to_string(),
            arguments: r#"{"query": "test"}"#.to_string(),
            result: "Found results".to_string(),
            success: true,
        };
        assert_eq!(format!("{}", record), r#"rag_search({"query": "test"})"#);
    }
}
