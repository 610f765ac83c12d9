//! `add_documents`: embed and store text documents with per-document failure isolation.

use super::ToolContext;
use crate::error::{RagChatError, Result};
use crate::vector_store::Point;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument, warn};

/// A document that could not be stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestFailure {
    /// Position in the submitted list.
    pub index: usize,
    pub reason: String,
}

/// Outcome of an `add_documents` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub collection: String,
    pub ingested: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    pub fn submitted(&self) -> usize {
        self.ingested + self.failures.len()
    }
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Added {} of {} document(s) to '{}'.",
            self.ingested,
            self.submitted(),
            self.collection
        )?;
        for failure in &self.failures {
            write!(f, "\nDocument {} failed: {}", failure.index, failure.reason)?;
        }
        Ok(())
    }
}

impl ToolContext {
    /// Embed each document and upsert it into `collection`.
    ///
    /// A missing collection fails the whole call. Individual embedding or storage
    /// errors are recorded in the report and do not stop the other documents.
    #[instrument(skip(self, documents), fields(documents = documents.len()))]
    pub async fn add_documents(&self, collection: &str, documents: &[String]) -> Result<IngestReport> {
        if !self.vector_store.collection_exists(collection).await? {
            return Err(RagChatError::CollectionNotFound(collection.to_string()));
        }

        let concurrency = self.settings.ingest_concurrency.max(1);
        let pending: Vec<BoxFuture<'_, (usize, Result<()>)>> = documents
            .iter()
            .enumerate()
            .map(|(index, text)| self.ingest_one(collection, text).map(move |r| (index, r)).boxed())
            .collect();
        let outcomes: Vec<(usize, Result<()>)> = stream::iter(pending)
            .buffered(concurrency)
            .collect()
            .await;

        let mut report = IngestReport {
            collection: collection.to_string(),
            ingested: 0,
            failures: Vec::new(),
        };
        for (index, outcome) in outcomes {
            match outcome {
                Ok(()) => report.ingested += 1,
                Err(e) => {
                    warn!("Document {} not ingested: {}", index, e);
                    report.failures.push(IngestFailure {
                        index,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Ingested {}/{} document(s) into '{}'",
            report.ingested,
            documents.len(),
            collection
        );
        Ok(report)
    }

    async fn ingest_one(&self, collection: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(RagChatError::InvalidInput("document is empty".into()));
        }
        let vector = self.embedder.embed(text).await?;
        self.vector_store
            .upsert(collection, &Point::with_text(vector, text))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;
    use crate::embedding::Embedder;
    use crate::test_support::{FailingEmbedder, HashEmbedder};
    use crate::vector_store::{MemoryVectorStore, VectorStore};
    use std::sync::Arc;

    async fn context(embedder: Arc<dyn Embedder>) -> (ToolContext, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        store.create_collection("kb", embedder.dimensions()).await.unwrap();
        let ctx = ToolContext::new(store.clone(), embedder, ToolSettings::default());
        (ctx, store)
    }

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    #[tokio::test]
    async fn test_ingest_future_is_send() {
        fn assert_send<T: Send>(_: &T) {}
        let (ctx, _) = context(Arc::new(HashEmbedder::new(8))).await;
        let documents = docs(&["alpha"]);
        let pending = ctx.add_documents("kb", &documents);
        assert_send(&pending);
        assert_eq!(pending.await.unwrap().ingested, 1);
    }

    #[tokio::test]
    async fn test_all_documents_ingested() {
        let (ctx, store) = context(Arc::new(HashEmbedder::new(32))).await;
        let report = ctx
            .add_documents("kb", &docs(&["alpha", "beta", "gamma"]))
            .await
            .unwrap();
        assert_eq!(report.ingested, 3);
        assert!(report.failures.is_empty());
        assert_eq!(store.collection_info("kb").await.unwrap().points, 3);
        assert_eq!(report.to_string(), "Added 3 of 3 document(s) to 'kb'.");
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let (ctx, store) = context(Arc::new(FailingEmbedder::new(32, "POISON"))).await;
        let report = ctx
            .add_documents("kb", &docs(&["fine", "POISON pill", "", "also fine"]))
            .await
            .unwrap();

        assert_eq!(report.ingested, 2);
        let failed: Vec<usize> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(failed, vec![1, 2]);
        assert!(report.failures[0].reason.contains("embedding service"));
        assert_eq!(store.collection_info("kb").await.unwrap().points, 2);
        assert!(report.to_string().contains("Document 1 failed"));
    }

    #[tokio::test]
    async fn test_missing_collection_fails_before_embedding() {
        let embedder = Arc::new(HashEmbedder::new(32));
        let (ctx, _) = context(embedder.clone()).await;
        let err = ctx.add_documents("other", &docs(&["x"])).await.unwrap_err();
        assert!(matches!(err, RagChatError::CollectionNotFound(name) if name == "other"));
        assert_eq!(embedder.calls(), 0);
    }
}
