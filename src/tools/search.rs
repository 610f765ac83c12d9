//! `rag_search`: semantic retrieval over one collection.

use super::ToolContext;
use crate::error::Result;
use crate::vector_store::{payload_text, rank, ScoredPoint};
use tracing::{debug, instrument};

/// Tool output when no passage carries text.
pub const NO_RESULTS: &str = "No relevant documents found for the query.";

/// A retrieved passage with its similarity score.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub text: String,
    pub score: f32,
}

/// Ranked passages returned by a search, best first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub passages: Vec<Passage>,
}

impl RetrievalResult {
    /// Keep hits whose payload has text, in score order, at most `top_k`.
    pub fn from_hits(hits: Vec<ScoredPoint>, top_k: usize) -> Self {
        let passages = rank(hits, usize::MAX)
            .into_iter()
            .filter_map(|hit| {
                payload_text(&hit.payload).map(|text| Passage {
                    text: text.to_string(),
                    score: hit.score,
                })
            })
            .take(top_k)
            .collect();
        Self { passages }
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Passages separated by blank lines, or [`NO_RESULTS`].
    pub fn to_tool_output(&self) -> String {
        if self.passages.is_empty() {
            return NO_RESULTS.to_string();
        }
        self.passages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

impl ToolContext {
    #[instrument(skip(self), fields(top_k))]
    pub async fn rag_search(
        &self,
        query: &str,
        collection: &str,
        top_k: u32,
    ) -> Result<RetrievalResult> {
        let vector = self.embedder.embed(query).await?;
        let hits = self
            .vector_store
            .search(collection, &vector, top_k as usize)
            .await?;
        let result = RetrievalResult::from_hits(hits, top_k as usize);
        debug!("Retrieved {} passage(s)", result.passages.len());
        Ok(result)
    }
}
