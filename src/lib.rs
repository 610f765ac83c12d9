//! ragchat - a conversational agent backend over document collections.
//!
//! A chat service whose agent answers questions by calling tools against a vector
//! store: it searches collections, creates them, adds documents and chunks PDFs.
//! Conversations are checkpointed per thread so they survive restarts.
//!
//! # Architecture
//!
//! - `config` - Configuration management
//! - `llm` - Language model abstraction (OpenAI chat completions with tools)
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector database abstraction (SQLite, Qdrant, in memory)
//! - `tools` - The agent's tool set and its dispatcher
//! - `agent` - The reasoning loop that alternates model calls and tool calls
//! - `conversation` - Thread state and checkpoint stores
//! - `chat` - Per-thread turn handling
//! - `auth` - Accounts, password hashing and bearer tokens
//! - `server` - HTTP API
//!
//! # Example
//!
//! ```rust,no_run
//! use ragchat::app::AppContext;
//! use ragchat::config::Settings;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = AppContext::from_settings(Settings::load()?)?;
//!
//!     let reply = ctx
//!         .chat
//!         .handle_turn("alice", None, vec!["What does the handbook say about VPN access?".into()])
//!         .await?;
//!     println!("{}", reply.response.content);
//!
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod app;
pub mod auth;
pub mod chat;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod server;
pub mod tools;
pub mod vector_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{RagChatError, Result};
