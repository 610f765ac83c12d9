//! Serve command: run the HTTP API.

use crate::app::AppContext;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::server;
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(host: Option<String>, port: Option<u16>, settings: Settings) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Chat, &settings) {
        Output::error(&e.to_string());
        Output::info("Run 'ragchat doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);
    let require_auth = settings.server.require_auth;
    let ctx = Arc::new(AppContext::from_settings(settings)?);

    let addr = format!("{}:{}", host, port);

    Output::header("ragchat API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Chat", "POST /chat");
    Output::kv("History", "GET  /chat/history?thread_id=...");
    Output::kv("Register", "POST /auth/register");
    Output::kv("Login", "POST /auth/login");
    Output::kv("Current user", "GET  /auth/me");
    Output::kv("Collections", "GET  /collections");
    println!();
    if require_auth {
        Output::info("Chat requires a bearer token from an active account.");
    }
    Output::info("Press Ctrl+C to stop the server.");

    server::serve(ctx, &addr).await?;

    Ok(())
}
