//! Configuration settings for ragchat.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
    pub vector_store: VectorStoreSettings,
    pub agent: AgentSettings,
    pub tools: ToolSettings,
    pub checkpoint: CheckpointSettings,
    pub auth: AuthSettings,
    pub server: ServerSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.ragchat".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Language model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Chat completion model.
    pub model: String,
    /// Override for OpenAI-compatible endpoints.
    pub api_base: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: None,
            request_timeout_secs: 120,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use. Must stay the same between ingestion and search.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorStoreProvider {
    #[default]
    Sqlite,
    Memory,
    Qdrant,
}

impl std::str::FromStr for VectorStoreProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(VectorStoreProvider::Sqlite),
            "memory" => Ok(VectorStoreProvider::Memory),
            "qdrant" => Ok(VectorStoreProvider::Qdrant),
            _ => Err(format!("Unknown vector store provider: {}", s)),
        }
    }
}

impl std::fmt::Display for VectorStoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreProvider::Sqlite => write!(f, "sqlite"),
            VectorStoreProvider::Memory => write!(f, "memory"),
            VectorStoreProvider::Qdrant => write!(f, "qdrant"),
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory, qdrant).
    pub provider: VectorStoreProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
    /// Qdrant REST endpoint (for qdrant provider).
    pub qdrant_url: String,
    /// Qdrant API key, if the instance requires one.
    pub qdrant_api_key: Option<String>,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: VectorStoreProvider::Sqlite,
            sqlite_path: "~/.ragchat/vectors.db".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            qdrant_api_key: None,
        }
    }
}

/// Agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// System prompt prepended to every model call.
    pub system_prompt: String,
    /// Maximum tool-dispatch cycles per turn.
    pub max_iterations: usize,
    /// Number of most recent messages sent to the model.
    pub history_window: usize,
    /// Run the tool calls of one model reply concurrently.
    pub parallel_tool_calls: bool,
    /// Upper bound for a whole turn, in seconds. 0 disables the bound.
    pub turn_timeout_secs: u64,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            system_prompt: crate::agent::DEFAULT_SYSTEM_PROMPT.to_string(),
            max_iterations: 10,
            history_window: 40,
            parallel_tool_calls: true,
            turn_timeout_secs: 300,
        }
    }
}

/// Retrieval tool limits and defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    /// Default number of passages returned by `rag_search`.
    pub default_top_k: u32,
    /// Largest `top_k` a model may request.
    pub max_top_k: u32,
    /// Concurrent embedding requests during `add_documents`.
    pub ingest_concurrency: usize,
    /// Default page cap for `pdf_chunker`.
    pub pdf_max_pages: u32,
    /// Default token budget per chunk for `pdf_chunker`.
    pub pdf_max_tokens_per_chunk: u32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            max_top_k: 20,
            ingest_concurrency: 4,
            pdf_max_pages: 15,
            pdf_max_tokens_per_chunk: 650,
        }
    }
}

/// Checkpoint store backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointProvider {
    Memory,
    #[default]
    Sqlite,
}

/// Conversation checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointSettings {
    /// Checkpoint provider (memory, sqlite).
    pub provider: CheckpointProvider,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for CheckpointSettings {
    fn default() -> Self {
        Self {
            provider: CheckpointProvider::Sqlite,
            sqlite_path: "~/.ragchat/conversations.db".to_string(),
        }
    }
}

/// Account and token settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HMAC secret for access tokens. `JWT_SECRET` overrides it.
    pub jwt_secret: String,
    /// Access token lifetime in minutes.
    pub token_ttl_minutes: i64,
    /// Path to the user database.
    pub users_db_path: String,
    /// New accounts are active immediately instead of waiting for an admin.
    pub activate_on_register: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: 60,
            users_db_path: "~/.ragchat/users.db".to_string(),
            activate_on_register: false,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Require a bearer token on the chat endpoints.
    pub require_auth: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8001,
            require_auth: false,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let mut settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };

        if let Ok(secret) = std::env::var("JWT_SECRET") {
            if !secret.is_empty() {
                settings.auth.jwt_secret = secret;
            }
        }

        Ok(settings)
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::RagChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ragchat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded vector database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }

    /// Get the expanded conversation database path.
    pub fn checkpoint_path(&self) -> PathBuf {
        Self::expand_path(&self.checkpoint.sqlite_path)
    }

    /// Get the expanded user database path.
    pub fn users_db_path(&self) -> PathBuf {
        Self::expand_path(&self.auth.users_db_path)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::RagChatError;

        if self.agent.max_iterations == 0 {
            return Err(RagChatError::Config("agent.max_iterations must be at least 1".into()));
        }
        if self.tools.default_top_k == 0 || self.tools.default_top_k > self.tools.max_top_k {
            return Err(RagChatError::Config(format!(
                "tools.default_top_k must be between 1 and tools.max_top_k ({})",
                self.tools.max_top_k
            )));
        }
        if self.tools.pdf_max_pages == 0 || self.tools.pdf_max_tokens_per_chunk == 0 {
            return Err(RagChatError::Config(
                "tools.pdf_max_pages and tools.pdf_max_tokens_per_chunk must be positive".into(),
            ));
        }
        if self.embedding.dimensions == 0 {
            return Err(RagChatError::Config("embedding.dimensions must be positive".into()));
        }
        Ok(())
    }
}
