//! OpenAI client configuration shared by the chat model and the embedder.

use crate::config::LlmSettings;
use crate::error::{RagChatError, Result};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for OpenAI API requests (2 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Create an OpenAI client from the LLM settings.
///
/// The API key comes from `OPENAI_API_KEY`; `api_base` overrides the endpoint for
/// OpenAI-compatible servers.
pub fn create_client(settings: &LlmSettings) -> Result<Client<OpenAIConfig>> {
    let timeout = if settings.request_timeout_secs == 0 {
        DEFAULT_TIMEOUT_SECS
    } else {
        settings.request_timeout_secs
    };

    let mut config = OpenAIConfig::default();
    if let Some(base) = settings.api_base.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    create_client_with_timeout(config, Duration::from_secs(timeout))
}

/// Create an OpenAI client with a custom timeout.
pub fn create_client_with_timeout(
    config: OpenAIConfig,
    timeout: Duration,
) -> Result<Client<OpenAIConfig>> {
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RagChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

    Ok(Client::with_config(config).with_http_client(http_client))
}
