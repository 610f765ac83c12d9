//! Error types for ragchat.

use thiserror::Error;

/// Library-level error type for ragchat operations.
#[derive(Error, Debug)]
pub enum RagChatError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecutionFailure { tool: String, reason: String },

    #[error("Agent exceeded the maximum of {max} tool-call cycles in one turn")]
    ToolLoopExceeded { max: usize },

    #[error("Turn timed out after {0} seconds")]
    TurnTimedOut(u64),

    #[error("{service} unavailable: {reason}")]
    ExternalServiceUnavailable { service: &'static str, reason: String },

    #[error("Invalid identifier '{0}': use 1-64 letters, digits, '_' or '-', starting with a letter or digit")]
    InvalidIdentifier(String),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("The email is already registered.")]
    EmailTaken,

    #[error("Account is pending activation.")]
    AccountInactive,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl RagChatError {
    /// Shorthand for an unreachable or failing external collaborator.
    pub fn unavailable(service: &'static str, reason: impl ToString) -> Self {
        Self::ExternalServiceUnavailable {
            service,
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a schema validation failure.
    pub fn invalid_args(tool: &str, reason: impl ToString) -> Self {
        Self::InvalidToolArguments {
            tool: tool.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that end a turn instead of being fed back to the model.
    pub fn is_fatal_to_turn(&self) -> bool {
        matches!(
            self,
            Self::ExternalServiceUnavailable { .. }
                | Self::ToolLoopExceeded { .. }
                | Self::TurnTimedOut(_)
                | Self::Checkpoint(_)
        )
    }
}

/// Result type alias for ragchat operations.
pub type Result<T> = std::result::Result<T, RagChatError>;
