//! `create_collection` and `get_collections`.

use super::ToolContext;
use crate::error::Result;
use crate::vector_store::validate_collection_name;
use tracing::info;

impl ToolContext {
    /// Create a collection sized for the configured embedder.
    ///
    /// Returns `false` when it already existed; the existing collection is untouched.
    pub async fn create_collection(&self, name: &str) -> Result<bool> {
        validate_collection_name(name)?;
        let created = self
            .vector_store
            .create_collection(name, self.embedder.dimensions())
            .await?;
        if created {
            info!("Created collection '{}'", name);
        }
        Ok(created)
    }

    /// All collection names, sorted.
    pub async fn get_collections(&self) -> Result<Vec<String>> {
        let mut names = self.vector_store.list_collections().await?;
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolSettings;
    use crate::error::RagChatError;
    use crate::test_support::HashEmbedder;
    use crate::tools::{parse_tool_call, ToolCall};
    use crate::vector_store::{MemoryVectorStore, Point, VectorStore};
    use std::sync::Arc;

    fn context() -> (ToolContext, Arc<MemoryVectorStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        let ctx = ToolContext::new(
            store.clone(),
            Arc::new(HashEmbedder::new(16)),
            ToolSettings::default(),
        );
        (ctx, store)
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let (ctx, store) = context();
        assert!(ctx.create_collection("handbook").await.unwrap());

        store
            .upsert("handbook", &Point::with_text(vec![1.0; 16], "keep me"))
            .await
            .unwrap();

        assert!(!ctx.create_collection("handbook").await.unwrap());
        assert_eq!(store.collection_info("handbook").await.unwrap().points, 1);
        assert_eq!(ctx.get_collections().await.unwrap(), vec!["handbook"]);
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let (ctx, _) = context();
        assert!(matches!(
            ctx.create_collection("../etc").await,
            Err(RagChatError::InvalidIdentifier(_))
        ));
        assert!(ctx.get_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_listing_is_sorted_and_rendered() {
        let (ctx, _) = context();
        for name in ["zeta", "alpha", "mid"] {
            ctx.create_collection(name).await.unwrap();
        }
        let out = ctx.execute(&ToolCall::GetCollections).await.unwrap();
        assert_eq!(out, "Collections (3):\n- alpha\n- mid\n- zeta");

        let call = parse_tool_call("create_collection", r#"{"name": "alpha"}"#, &ctx.settings)
            .unwrap();
        let out = ctx.execute(&call).await.unwrap();
        assert!(out.contains("already exists"));
    }
}
