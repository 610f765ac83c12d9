//! Vector store abstraction for ragchat.
//!
//! Provides a trait-based interface over named collections of embedded points, with
//! SQLite, in-memory and Qdrant backends.

mod memory;
mod qdrant;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use qdrant::QdrantVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::error::{RagChatError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use uuid::Uuid;

static COLLECTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("valid regex"));

/// Check a collection name before it reaches any backend.
pub fn validate_collection_name(name: &str) -> Result<()> {
    if COLLECTION_NAME.is_match(name) {
        Ok(())
    } else {
        Err(RagChatError::InvalidIdentifier(name.to_string()))
    }
}

/// An embedded point stored in a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Point {
    /// Unique point ID.
    pub id: Uuid,
    /// Embedding vector.
    pub vector: Vec<f32>,
    /// Arbitrary JSON payload. Retrieval reads the `text` field.
    pub payload: serde_json::Value,
}

impl Point {
    /// Create a point carrying a text passage.
    pub fn with_text(vector: Vec<f32>, text: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            vector,
            payload: serde_json::json!({ "text": text }),
        }
    }

    /// Extractable text of the payload, if any.
    pub fn text(&self) -> Option<&str> {
        payload_text(&self.payload)
    }
}

/// Non-empty `text` field of a payload.
pub fn payload_text(payload: &serde_json::Value) -> Option<&str> {
    payload
        .get("text")
        .and_then(|t| t.as_str())
        .filter(|t| !t.trim().is_empty())
}

/// A search hit with score.
#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: Uuid,
    /// Similarity score (higher is better).
    pub score: f32,
    pub payload: serde_json::Value,
}

/// Summary information about a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub dimensions: usize,
    pub points: usize,
}

/// Trait for vector store implementations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a collection. Returns `false` when it already existed, in which case
    /// nothing is modified.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<bool>;

    /// Check whether a collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// List collection names, sorted.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Describe a collection.
    async fn collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Insert or replace a point.
    async fn upsert(&self, collection: &str, point: &Point) -> Result<()>;

    /// Nearest neighbours of `vector`, best first, at most `limit` hits.
    async fn search(&self, collection: &str, vector: &[f32], limit: usize)
        -> Result<Vec<ScoredPoint>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Sort hits best first and keep at most `limit`. Hits with a NaN score are dropped.
pub(crate) fn rank(mut hits: Vec<ScoredPoint>, limit: usize) -> Vec<ScoredPoint> {
    hits.retain(|hit| !hit.score.is_nan());
    hits.sort_by(|a, b| b.score.total_cmp(&a.score));
    hits.truncate(limit);
    hits
}

pub(crate) fn check_dimensions(collection: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(RagChatError::VectorStore(format!(
            "collection '{}' stores {}-dimensional vectors, got {}",
            collection, expected, actual
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);
    }

    #[test]
    fn test_collection_names() {
        assert!(validate_collection_name("docs").is_ok());
        assert!(validate_collection_name("hr-policies_2024").is_ok());
        assert!(validate_collection_name("").is_err());
        assert!(validate_collection_name("_hidden").is_err());
        assert!(validate_collection_name("has space").is_err());
        assert!(validate_collection_name("../etc").is_err());
        assert!(validate_collection_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn test_rank_orders_and_drops_nan() {
        let hit = |score: f32| ScoredPoint {
            id: Uuid::new_v4(),
            score,
            payload: serde_json::json!({"text": "t"}),
        };
        let ranked = rank(
            vec![hit(0.2), hit(f32::NAN), hit(0.9), hit(-0.5), hit(f32::NAN), hit(0.4)],
            3,
        );
        let scores: Vec<f32> = ranked.iter().map(|h| h.score).collect();
        assert_eq!(scores, vec![0.9, 0.4, 0.2]);
    }

    #[test]
    fn test_payload_text_ignores_blank() {
        assert_eq!(payload_text(&serde_json::json!({"text": "hi"})), Some("hi"));
        assert_eq!(payload_text(&serde_json::json!({"text": "  "})), None);
        assert_eq!(payload_text(&serde_json::json!({"title": "x"})), None);
        assert_eq!(payload_text(&serde_json::json!({"text": 3})), None);
    }
}
