//! CLI command implementations.

mod chat;
mod collections;
mod config;
mod doctor;
mod ingest;
mod search;
mod serve;
mod users;

pub use chat::run_chat;
pub use collections::run_collections;
pub use config::run_config;
pub use doctor::run_doctor;
pub use ingest::run_ingest;
pub use search::run_search;
pub use serve::run_serve;
pub use users::run_users;
