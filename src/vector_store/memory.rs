//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{check_dimensions, cosine_similarity, rank, CollectionInfo, Point, ScoredPoint, VectorStore};
use crate::error::{RagChatError, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use uuid::Uuid;

struct Collection {
    dimensions: usize,
    points: HashMap<Uuid, Point>,
}

/// In-memory vector store.
pub struct MemoryVectorStore {
    collections: RwLock<BTreeMap<String, Collection>>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: PoisonError<T>) -> RagChatError {
    RagChatError::VectorStore("collection lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<bool> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        if collections.contains_key(name) {
            return Ok(false);
        }
        collections.insert(
            name.to_string(),
            Collection {
                dimensions,
                points: HashMap::new(),
            },
        );
        Ok(true)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().map_err(poisoned)?.contains_key(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        Ok(self.collections.read().map_err(poisoned)?.keys().cloned().collect())
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read().map_err(poisoned)?;
        let collection = collections
            .get(name)
            .ok_or_else(|| RagChatError::CollectionNotFound(name.to_string()))?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimensions: collection.dimensions,
            points: collection.points.len(),
        })
    }

    async fn upsert(&self, collection: &str, point: &Point) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let target = collections
            .get_mut(collection)
            .ok_or_else(|| RagChatError::CollectionNotFound(collection.to_string()))?;
        check_dimensions(collection, target.dimensions, point.vector.len())?;
        target.points.insert(point.id, point.clone());
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let target = collections
            .get(collection)
            .ok_or_else(|| RagChatError::CollectionNotFound(collection.to_string()))?;

        let hits = target
            .points
            .values()
            .map(|p| ScoredPoint {
                id: p.id,
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        Ok(rank(hits, limit))
    }
}
