//! Pre-flight checks before operations that call external services.
//!
//! Validates that required configuration is available before starting
//! operations that would otherwise fail midway.

use crate::config::{Settings, VectorStoreProvider};
use crate::error::{RagChatError, Result};

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Chatting and serving need the model and embedding API.
    Chat,
    /// Search and ingestion need the embedding API.
    Embed,
    /// Collection and account management only touch local stores.
    Local,
}

/// Run pre-flight checks for the given operation.
pub fn check(operation: Operation, settings: &Settings) -> Result<()> {
    settings.validate()?;
    match operation {
        Operation::Chat | Operation::Embed => check_api_key()?,
        Operation::Local => {}
    }
    if settings.vector_store.provider == VectorStoreProvider::Qdrant {
        url::Url::parse(&settings.vector_store.qdrant_url).map_err(|e| {
            RagChatError::Config(format!(
                "vector_store.qdrant_url '{}' is not a valid URL: {}",
                settings.vector_store.qdrant_url, e
            ))
        })?;
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(RagChatError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(RagChatError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
    }
}
