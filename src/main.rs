//! ragchat CLI entry point.

use anyhow::Result;
use clap::Parser;
use ragchat::app::AppContext;
use ragchat::auth::UserStore;
use ragchat::cli::preflight::{self, Operation};
use ragchat::cli::{commands, Cli, Commands, Output};
use ragchat::config::Settings;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Checks the requirements of `operation` and builds the application context.
fn context(operation: Operation, settings: Settings) -> Result<AppContext> {
    if let Err(e) = preflight::check(operation, &settings) {
        Output::error(&e.to_string());
        Output::info("Run 'ragchat doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(AppContext::from_settings(settings)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli
        .config
        .as_deref()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .unwrap_or_else(Settings::default_config_path);
    let settings = Settings::load_from(Some(&config_path))?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("ragchat={},tower_http={}", log_level, log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure the data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Doctor => {
            commands::run_doctor(&settings, &config_path).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host.clone(), *port, settings).await?;
        }

        Commands::Chat {
            message,
            user,
            thread,
        } => {
            let ctx = context(Operation::Chat, settings)?;
            commands::run_chat(message.as_deref(), user, thread.as_deref(), &ctx).await?;
        }

        Commands::Search {
            query,
            collection,
            top_k,
        } => {
            let ctx = context(Operation::Embed, settings)?;
            commands::run_search(query, collection, *top_k, &ctx).await?;
        }

        Commands::Ingest {
            collection,
            files,
            create,
        } => {
            let ctx = context(Operation::Embed, settings)?;
            commands::run_ingest(collection, files, *create, &ctx).await?;
        }

        Commands::Collections { action } => {
            let ctx = context(Operation::Local, settings)?;
            commands::run_collections(action, &ctx).await?;
        }

        Commands::Users { action } => {
            let users = UserStore::new(&settings.users_db_path())?;
            commands::run_users(action, &users)?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
