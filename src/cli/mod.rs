//! CLI module for ragchat.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ragchat - conversational agent over your document collections
///
/// Serves a chat API whose agent searches, creates and fills vector collections
/// through tool calls, and offers the same operations from the command line.
#[derive(Parser, Debug)]
#[command(name = "ragchat")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check system requirements and configuration
    Doctor,

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with the agent (interactive unless a message is given)
    Chat {
        /// Send a single message and exit
        message: Option<String>,

        /// User id the conversation belongs to
        #[arg(short, long, default_value = "local")]
        user: String,

        /// Conversation thread (defaults to the user id)
        #[arg(short, long)]
        thread: Option<String>,
    },

    /// Search a collection
    Search {
        /// Search query
        query: String,

        /// Collection to search
        #[arg(short = 'C', long)]
        collection: String,

        /// Maximum number of passages
        #[arg(short = 'k', long)]
        top_k: Option<u32>,
    },

    /// Add text or PDF files to a collection
    Ingest {
        /// Target collection
        collection: String,

        /// Files to add (.pdf files are chunked first)
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Create the collection if it does not exist
        #[arg(long)]
        create: bool,
    },

    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionsAction,
    },

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CollectionsAction {
    /// List collections
    List,

    /// Create a collection
    Create {
        /// Collection name
        name: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum UsersAction {
    /// List accounts
    List,

    /// Allow an account to chat
    Activate { email: String },

    /// Suspend an account
    Deactivate { email: String },

    /// Grant admin rights
    Promote { email: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the default configuration file if none exists
    Init,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_ingest() {
        let cli = Cli::parse_from(["ragchat", "ingest", "handbook", "a.pdf", "b.txt", "--create"]);
        match cli.command {
            Commands::Ingest {
                collection,
                files,
                create,
            } => {
                assert_eq!(collection, "handbook");
                assert_eq!(files.len(), 2);
                assert!(create);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
