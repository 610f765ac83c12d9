//! Configuration module for ragchat.
//!
//! Handles loading and validating application settings.

mod settings;

pub use settings::{
    AgentSettings, AuthSettings, CheckpointProvider, CheckpointSettings, EmbeddingSettings,
    GeneralSettings, LlmSettings, ServerSettings, Settings, ToolSettings, VectorStoreProvider,
    VectorStoreSettings,
};
