//! Retrieval tools the agent can call, and the dispatcher that binds them to the model.
//!
//! Every tool has a static entry in [`ToolName`]: a name, a description and a JSON
//! schema. Raw model requests are parsed into a typed [`ToolCall`] before anything
//! touches the embedder or the vector store.

mod collections;
mod dispatcher;
mod ingest;
mod pdf;
mod search;

pub use dispatcher::{validate_schema, ToolDispatcher, ToolOutcome};
pub use ingest::{IngestFailure, IngestReport};
pub use pdf::{chunk_pages, count_tokens, extract_pages, PdfChunks};
pub use search::{Passage, RetrievalResult, NO_RESULTS};

use crate::config::ToolSettings;
use crate::embedding::Embedder;
use crate::error::{RagChatError, Result};
use crate::vector_store::VectorStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Registered tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolName {
    RagSearch,
    CreateCollection,
    AddDocuments,
    GetCollections,
    PdfChunker,
}

impl ToolName {
    /// Every registered tool, in declaration order.
    pub const ALL: [ToolName; 5] = [
        ToolName::RagSearch,
        ToolName::CreateCollection,
        ToolName::AddDocuments,
        ToolName::GetCollections,
        ToolName::PdfChunker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::RagSearch => "rag_search",
            ToolName::CreateCollection => "create_collection",
            ToolName::AddDocuments => "add_documents",
            ToolName::GetCollections => "get_collections",
            ToolName::PdfChunker => "pdf_chunker",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolName::RagSearch => {
                "Search a document collection for passages relevant to a query. \
                Use this to answer questions from internal documentation."
            }
            ToolName::CreateCollection => {
                "Create a new document collection. Creating a collection that already \
                exists changes nothing."
            }
            ToolName::AddDocuments => {
                "Embed and add text documents to an existing collection. Reports how many \
                were added and which failed."
            }
            ToolName::GetCollections => "List the names of all document collections.",
            ToolName::PdfChunker => {
                "Extract text from a PDF file and split it into chunks small enough to \
                pass to add_documents."
            }
        }
    }

    /// JSON schema of the tool's arguments under the given limits.
    pub fn parameters(&self, settings: &ToolSettings) -> serde_json::Value {
        let collection = json!({
            "type": "string",
            "description": "Collection name: letters, digits, '_' or '-'",
            "pattern": "^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$"
        });

        match self {
            ToolName::RagSearch => json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "The search query" },
                    "collection": collection,
                    "top_k": {
                        "type": "integer",
                        "description": "Maximum number of passages to return",
                        "minimum": 1,
                        "maximum": settings.max_top_k,
                        "default": settings.default_top_k
                    }
                },
                "required": ["query", "collection"],
                "additionalProperties": false
            }),
            ToolName::CreateCollection => json!({
                "type": "object",
                "properties": { "name": collection },
                "required": ["name"],
                "additionalProperties": false
            }),
            ToolName::AddDocuments => json!({
                "type": "object",
                "properties": {
                    "collection": collection,
                    "documents": {
                        "type": "array",
                        "items": { "type": "string" },
                        "minItems": 1,
                        "description": "Text documents to add"
                    }
                },
                "required": ["collection", "documents"],
                "additionalProperties": false
            }),
            ToolName::GetCollections => json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
            ToolName::PdfChunker => json!({
                "type": "object",
                "properties": {
                    "file_path": { "type": "string", "description": "Path of the PDF file" },
                    "max_pages": {
                        "type": "integer",
                        "description": "Maximum number of pages to read",
                        "minimum": 1,
                        "default": settings.pdf_max_pages
                    },
                    "max_tokens_per_chunk": {
                        "type": "integer",
                        "description": "Maximum tokens per chunk",
                        "minimum": 1,
                        "default": settings.pdf_max_tokens_per_chunk
                    }
                },
                "required": ["file_path"],
                "additionalProperties": false
            }),
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolName {
    type Err = RagChatError;

    fn from_str(s: &str) -> Result<Self> {
        ToolName::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RagChatError::UnknownTool(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RagSearchArgs {
    pub query: String,
    pub collection: String,
    #[serde(default)]
    pub top_k: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCollectionArgs {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddDocumentsArgs {
    #[serde(alias = "collection_name")]
    pub collection: String,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PdfChunkerArgs {
    pub file_path: String,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub max_tokens_per_chunk: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NoArgs {}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    RagSearch(RagSearchArgs),
    CreateCollection(CreateCollectionArgs),
    AddDocuments(AddDocumentsArgs),
    GetCollections,
    PdfChunker(PdfChunkerArgs),
}

impl ToolCall {
    pub fn name(&self) -> ToolName {
        match self {
            ToolCall::RagSearch(_) => ToolName::RagSearch,
            ToolCall::CreateCollection(_) => ToolName::CreateCollection,
            ToolCall::AddDocuments(_) => ToolName::AddDocuments,
            ToolCall::GetCollections => ToolName::GetCollections,
            ToolCall::PdfChunker(_) => ToolName::PdfChunker,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(tool: ToolName, arguments: &str) -> Result<T> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(raw).map_err(|e| RagChatError::invalid_args(tool.as_str(), e))
}

fn check_identifier(tool: ToolName, field: &str, value: &str) -> Result<()> {
    crate::vector_store::validate_collection_name(value)
        .map_err(|e| RagChatError::invalid_args(tool.as_str(), format!("{}: {}", field, e)))
}

/// Parse and validate a raw tool request against the tool's schema and limits.
pub fn parse_tool_call(name: &str, arguments: &str, settings: &ToolSettings) -> Result<ToolCall> {
    let tool: ToolName = name.parse()?;
    let invalid = |reason: String| RagChatError::invalid_args(tool.as_str(), reason);

    match tool {
        ToolName::RagSearch => {
            let args: RagSearchArgs = decode(tool, arguments)?;
            if args.query.trim().is_empty() {
                return Err(invalid("query must not be empty".into()));
            }
            check_identifier(tool, "collection", &args.collection)?;
            if let Some(k) = args.top_k {
                if k == 0 || k > settings.max_top_k {
                    return Err(invalid(format!(
                        "top_k must be between 1 and {}, got {}",
                        settings.max_top_k, k
                    )));
                }
            }
            Ok(ToolCall::RagSearch(args))
        }
        ToolName::CreateCollection => {
            let args: CreateCollectionArgs = decode(tool, arguments)?;
            check_identifier(tool, "name", &args.name)?;
            Ok(ToolCall::CreateCollection(args))
        }
        ToolName::AddDocuments => {
            let args: AddDocumentsArgs = decode(tool, arguments)?;
            check_identifier(tool, "collection", &args.collection)?;
            if args.documents.is_empty() {
                return Err(invalid("documents must contain at least one entry".into()));
            }
            Ok(ToolCall::AddDocuments(args))
        }
        ToolName::GetCollections => {
            let _: NoArgs = decode(tool, arguments)?;
            Ok(ToolCall::GetCollections)
        }
        ToolName::PdfChunker => {
            let args: PdfChunkerArgs = decode(tool, arguments)?;
            if args.file_path.trim().is_empty() {
                return Err(invalid("file_path must not be empty".into()));
            }
            if args.max_pages == Some(0) || args.max_tokens_per_chunk == Some(0) {
                return Err(invalid(
                    "max_pages and max_tokens_per_chunk must be positive".into(),
                ));
            }
            Ok(ToolCall::PdfChunker(args))
        }
    }
}

/// Shared dependencies of the tool implementations.
#[derive(Clone)]
pub struct ToolContext {
    pub vector_store: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn Embedder>,
    pub settings: ToolSettings,
}

impl ToolContext {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        embedder: Arc<dyn Embedder>,
        settings: ToolSettings,
    ) -> Self {
        Self {
            vector_store,
            embedder,
            settings,
        }
    }

    /// Execute a validated call and render its result as text for the model.
    pub async fn execute(&self, call: &ToolCall) -> Result<String> {
        match call {
            ToolCall::RagSearch(args) => {
                let top_k = args.top_k.unwrap_or(self.settings.default_top_k);
                let result = self.rag_search(&args.query, &args.collection, top_k).await?;
                Ok(result.to_tool_output())
            }
            ToolCall::CreateCollection(args) => {
                let created = self.create_collection(&args.name).await?;
                Ok(if created {
                    format!("Collection '{}' created.", args.name)
                } else {
                    format!("Collection '{}' already exists; nothing changed.", args.name)
                })
            }
            ToolCall::AddDocuments(args) => {
                let report = self.add_documents(&args.collection, &args.documents).await?;
                Ok(report.to_string())
            }
            ToolCall::GetCollections => {
                let names = self.get_collections().await?;
                if names.is_empty() {
                    Ok("No collections yet.".to_string())
                } else {
                    Ok(format!("Collections ({}):\n- {}", names.len(), names.join("\n- ")))
                }
            }
            ToolCall::PdfChunker(args) => {
                let chunks = self
                    .pdf_chunker(
                        &args.file_path,
                        args.max_pages.unwrap_or(self.settings.pdf_max_pages),
                        args.max_tokens_per_chunk
                            .unwrap_or(self.settings.pdf_max_tokens_per_chunk),
                    )
                    .await?;
                Ok(chunks.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ToolSettings {
        ToolSettings::default()
    }

    #[test]
    fn test_parse_rag_search() {
        let call = parse_tool_call(
            "rag_search",
            r#"{"query": "vacation policy", "collection": "hr", "top_k": 3}"#,
            &settings(),
        )
        .unwrap();
        match call {
            ToolCall::RagSearch(args) => {
                assert_eq!(args.query, "vacation policy");
                assert_eq!(args.collection, "hr");
                assert_eq!(args.top_k, Some(3));
            }
            other => panic!("Expected RagSearch, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_tool() {
        assert!(matches!(
            parse_tool_call("delete_everything", "{}", &settings()),
            Err(RagChatError::UnknownTool(name)) if name == "delete_everything"
        ));
    }

    #[test]
    fn test_invalid_arguments() {
        let s = settings();
        let cases = [
            ("rag_search", r#"{"query": "x"}"#),
            ("rag_search", r#"{"query": "x", "collection": "hr", "top_k": 0}"#),
            ("rag_search", r#"{"query": "x", "collection": "hr", "top_k": 21}"#),
            ("rag_search", r#"{"query": "x", "collection": "h r"}"#),
            ("rag_search", r#"{"query": "", "collection": "hr"}"#),
            ("create_collection", r#"{"name": "ok", "extra": 1}"#),
            ("add_documents", r#"{"collection": "hr", "documents": []}"#),
            ("get_collections", r#"{"unexpected": true}"#),
            ("pdf_chunker", r#"{"file_path": "a.pdf", "max_pages": 0}"#),
            ("pdf_chunker", "not json"),
        ];
        for (name, args) in cases {
            let result = parse_tool_call(name, args, &s);
            assert!(
                matches!(result, Err(RagChatError::InvalidToolArguments { .. })),
                "{} {} should be rejected, got {:?}",
                name,
                args,
                result
            );
        }
    }

    #[test]
    fn test_add_documents_accepts_collection_name_alias() {
        let call = parse_tool_call(
            "add_documents",
            r#"{"collection_name": "hr", "documents": ["a", "b"]}"#,
            &settings(),
        )
        .unwrap();
        assert_eq!(
            call,
            ToolCall::AddDocuments(AddDocumentsArgs {
                collection: "hr".into(),
                documents: vec!["a".into(), "b".into()],
            })
        );
    }

    #[test]
    fn test_get_collections_accepts_empty_arguments() {
        assert_eq!(
            parse_tool_call("get_collections", "", &settings()).unwrap(),
            ToolCall::GetCollections
        );
        assert_eq!(
            parse_tool_call("get_collections", "{}", &settings()).unwrap().name(),
            ToolName::GetCollections
        );
    }

    #[test]
    fn test_tool_name_round_trip() {
        for tool in ToolName::ALL {
            assert_eq!(tool.as_str().parse::<ToolName>().unwrap(), tool);
        }
    }
}
