//! Startup-validated tool registry and request dispatch.

use super::{parse_tool_call, ToolContext, ToolName};
use crate::config::ToolSettings;
use crate::conversation::{Message, ToolCallRequest};
use crate::error::{RagChatError, Result};
use crate::llm::ToolSpec;
use futures::future::{join_all, BoxFuture, FutureExt};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// The result of one tool request, ready to be appended as a tool message.
#[derive(Debug)]
pub struct ToolOutcome {
    pub request: ToolCallRequest,
    pub result: Result<String>,
}

impl ToolOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Text the model sees: the tool output, or the error description.
    pub fn content(&self) -> String {
        match &self.result {
            Ok(text) => text.clone(),
            Err(e) => format!("Error: {}", e),
        }
    }

    pub fn to_message(&self) -> Message {
        Message::tool(&self.request.id, &self.request.name, self.content())
    }
}

/// Sample value satisfying a property schema, for the startup self-check.
fn sample_value(property: &Value) -> Option<Value> {
    if let Some(default) = property.get("default") {
        return Some(default.clone());
    }
    match property.get("type")?.as_str()? {
        "string" => Some(Value::from("sample")),
        "integer" => Some(property.get("minimum").cloned().unwrap_or(Value::from(1))),
        "number" => Some(Value::from(1.0)),
        "boolean" => Some(Value::from(false)),
        "array" => {
            let item = property.get("items").and_then(sample_value)?;
            Some(Value::Array(vec![item]))
        }
        _ => None,
    }
}

/// Check that a tool's declared schema and its argument parser agree.
///
/// Required keys must be declared properties, an object built from the schema must
/// parse, and an undeclared key must be rejected.
pub fn validate_schema(tool: ToolName, schema: &Value, settings: &ToolSettings) -> Result<()> {
    let fail = |reason: String| RagChatError::Config(format!("tool '{}': {}", tool, reason));

    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Err(fail("schema type must be 'object'".into()));
    }
    if schema.get("additionalProperties") != Some(&Value::Bool(false)) {
        return Err(fail("schema must set additionalProperties to false".into()));
    }
    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| fail("schema has no properties object".into()))?;

    let required: Vec<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    for key in &required {
        if !properties.contains_key(*key) {
            return Err(fail(format!("required key '{}' is not a declared property", key)));
        }
    }

    let mut sample = Map::new();
    for (key, property) in properties {
        let value = sample_value(property)
            .ok_or_else(|| fail(format!("cannot build a sample for property '{}'", key)))?;
        sample.insert(key.clone(), value);
    }
    parse_tool_call(tool.as_str(), &Value::Object(sample.clone()).to_string(), settings)
        .map_err(|e| fail(format!("schema sample rejected by parser: {}", e)))?;

    let mut required_only = Map::new();
    for key in &required {
        if let Some(value) = sample.get(*key) {
            required_only.insert(key.to_string(), value.clone());
        }
    }
    parse_tool_call(tool.as_str(), &Value::Object(required_only).to_string(), settings)
        .map_err(|e| fail(format!("required keys alone rejected by parser: {}", e)))?;

    sample.insert("__undeclared__".into(), Value::Bool(true));
    if parse_tool_call(tool.as_str(), &Value::Object(sample).to_string(), settings).is_ok() {
        return Err(fail("parser accepts undeclared properties".into()));
    }

    Ok(())
}

/// Binds the registered tools to the model and executes their requests.
pub struct ToolDispatcher {
    context: ToolContext,
    specs: Vec<ToolSpec>,
}

impl ToolDispatcher {
    /// Build the registry, refusing to start if any tool definition is inconsistent.
    pub fn new(context: ToolContext) -> Result<Self> {
        let mut specs = Vec::with_capacity(ToolName::ALL.len());
        for tool in ToolName::ALL {
            let parameters = tool.parameters(&context.settings);
            validate_schema(tool, &parameters, &context.settings)?;
            if specs.iter().any(|s: &ToolSpec| s.name == tool.as_str()) {
                return Err(RagChatError::Config(format!("duplicate tool name '{}'", tool)));
            }
            specs.push(ToolSpec {
                name: tool.as_str().to_string(),
                description: tool.description().to_string(),
                parameters,
            });
        }
        info!("Registered {} tools", specs.len());
        Ok(Self { context, specs })
    }

    /// Tool declarations sent to the model.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Validate and run one request. Failures become the outcome's error, never a panic.
    pub async fn dispatch(&self, request: &ToolCallRequest) -> ToolOutcome {
        debug!("Dispatching {}", request);
        let result = match parse_tool_call(&request.name, &request.arguments, &self.context.settings)
        {
            Ok(call) => self
                .context
                .execute(&call)
                .await
                .map_err(|e| RagChatError::ToolExecutionFailure {
                    tool: request.name.clone(),
                    reason: e.to_string(),
                }),
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!("Tool call {} failed: {}", request.id, e);
        }
        ToolOutcome {
            request: request.clone(),
            result,
        }
    }

    /// Run all requests of one agent message. Outcomes keep request order.
    pub async fn dispatch_all(&self, requests: &[ToolCallRequest], parallel: bool) -> Vec<ToolOutcome> {
        if parallel {
            let pending: Vec<BoxFuture<'_, ToolOutcome>> =
                requests.iter().map(|r| self.dispatch(r).boxed()).collect();
            join_all(pending).await
        } else {
            let mut outcomes = Vec::with_capacity(requests.len());
            for request in requests {
                outcomes.push(self.dispatch(request).await);
            }
            outcomes
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::HashEmbedder;
    use crate::vector_store::MemoryVectorStore;
    use serde_json::json;
    use std::sync::Arc;

    fn dispatcher() -> ToolDispatcher {
        let context = ToolContext::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(HashEmbedder::new(16)),
            ToolSettings::default(),
        );
        ToolDispatcher::new(context).unwrap()
    }

    #[tokio::test]
    async fn test_parallel_dispatch_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let dispatcher = dispatcher();
        let requests = vec![
            ToolCallRequest::new("1", "get_collections", "{}"),
            ToolCallRequest::new("2", "nope", "{}"),
        ];
        let pending = dispatcher.dispatch_all(&requests, true);
        assert_send(&pending);
        let outcomes = pending.await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].is_ok());
        assert!(!outcomes[1].is_ok());
    }

    #[test]
    fn test_registry_declares_every_tool() {
        let d = dispatcher();
        let names: Vec<&str> = d.specs().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["rag_search", "create_collection", "add_documents", "get_collections", "pdf_chunker"]
        );
        assert_eq!(d.specs()[0].parameters["properties"]["top_k"]["maximum"], 20);
    }

    #[test]
    fn test_drifted_schema_is_rejected() {
        let settings = ToolSettings::default();

        // parser needs `collection`, schema forgot it
        let missing = json!({
            "type": "object",
            "properties": { "query": { "type": "string" } },
            "required": ["query"],
            "additionalProperties": false
        });
        assert!(validate_schema(ToolName::RagSearch, &missing, &settings).is_err());

        let undeclared_required = json!({
            "type": "object",
            "properties": {},
            "required": ["name"],
            "additionalProperties": false
        });
        assert!(validate_schema(ToolName::CreateCollection, &undeclared_required, &settings).is_err());

        let open = json!({ "type": "object", "properties": {} });
        assert!(validate_schema(ToolName::GetCollections, &open, &settings).is_err());
    }

    #[tokio::test]
    async fn test_errors_become_outcomes() {
        let d = dispatcher();

        let unknown = d.dispatch(&ToolCallRequest::new("c1", "rm_rf", "{}")).await;
        assert!(matches!(unknown.result, Err(RagChatError::UnknownTool(_))));
        assert!(unknown.content().starts_with("Error: "));

        let invalid = d
            .dispatch(&ToolCallRequest::new("c2", "rag_search", r#"{"query": 1}"#))
            .await;
        assert!(matches!(invalid.result, Err(RagChatError::InvalidToolArguments { .. })));

        let failed = d
            .dispatch(&ToolCallRequest::new(
                "c3",
                "rag_search",
                r#"{"query": "q", "collection": "missing"}"#,
            ))
            .await;
        assert!(matches!(failed.result, Err(RagChatError::ToolExecutionFailure { .. })));

        let message = failed.to_message();
        assert_eq!(message.role(), "tool");
        assert!(matches!(message, Message::Tool { ref call_id, .. } if call_id == "c3"));
    }

    #[tokio::test]
    async fn test_dispatch_all_keeps_request_order() {
        let d = dispatcher();
        let requests = vec![
            ToolCallRequest::new("a", "create_collection", r#"{"name": "one"}"#),
            ToolCallRequest::new("b", "create_collection", r#"{"name": "two"}"#),
            ToolCallRequest::new("c", "nope", "{}"),
        ];

        for parallel in [true, false] {
            let outcomes = d.dispatch_all(&requests, parallel).await;
            let ids: Vec<&str> = outcomes.iter().map(|o| o.request.id.as_str()).collect();
            assert_eq!(ids, vec!["a", "b", "c"]);
            assert!(!outcomes[2].is_ok());
        }
        assert_eq!(d.context().get_collections().await.unwrap(), vec!["one", "two"]);
    }
}
