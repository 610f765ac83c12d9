//! Doctor command - verify configuration and local stores.

use crate::cli::Output;
use crate::config::{CheckpointProvider, Settings, VectorStoreProvider};
use crate::vector_store::{QdrantVectorStore, VectorStore};
use console::style;
use std::path::Path;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn section(title: &str, checks: Vec<CheckResult>, all: &mut Vec<CheckResult>) {
    println!("{}", style(title).bold());
    for check in &checks {
        check.print();
    }
    println!();
    all.extend(checks);
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: &Path) -> anyhow::Result<()> {
    Output::header("ragchat doctor");
    println!();
    println!("Checking configuration and stores...\n");

    let mut checks = Vec::new();
    section("API Configuration", vec![check_openai_api_key()], &mut checks);
    section("Configuration", check_config(settings, config_path), &mut checks);
    section("Storage", check_storage(settings).await, &mut checks);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before serving.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! ragchat is ready to use.");
    }

    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    api_key_result(std::env::var("OPENAI_API_KEY").ok().as_deref())
}

fn api_key_result(key: Option<&str>) -> CheckResult {
    match key {
        Some(key) if key.starts_with("sk-") && key.chars().count() > 20 => {
            let head: String = key.chars().take(7).collect();
            let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({}...{})", head, tail))
        }
        Some("") => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Some(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Fine for OpenAI-compatible servers configured through llm.api_base",
        ),
        None => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

fn check_config(settings: &Settings, config_path: &Path) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if config_path.exists() {
        results.push(CheckResult::ok("Config file", &config_path.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: ragchat config init",
        ));
    }

    results.push(match settings.validate() {
        Ok(()) => CheckResult::ok("Settings", "valid"),
        Err(e) => CheckResult::error("Settings", &e.to_string(), "Fix the value in the config file"),
    });

    results.push(if settings.auth.jwt_secret.is_empty() {
        CheckResult::warning(
            "JWT secret",
            "not set, a random one is generated per process",
            "Set auth.jwt_secret or JWT_SECRET so tokens survive restarts",
        )
    } else {
        CheckResult::ok("JWT secret", "configured")
    });

    if !settings.server.require_auth {
        results.push(CheckResult::warning(
            "Chat authentication",
            "disabled, /chat trusts the user_id in the request",
            "Set server.require_auth = true for shared deployments",
        ));
    }

    results
}

fn file_check(name: &str, path: &Path) -> CheckResult {
    if path.exists() {
        let size = std::fs::metadata(path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        CheckResult::ok(name, &format!("{} ({})", path.display(), size))
    } else {
        CheckResult::warning(
            name,
            &format!("{} (not created yet)", path.display()),
            "Created on first use",
        )
    }
}

async fn check_storage(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &data_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    match settings.vector_store.provider {
        VectorStoreProvider::Sqlite => {
            results.push(file_check("Vector store", &settings.sqlite_path()));
        }
        VectorStoreProvider::Memory => results.push(CheckResult::warning(
            "Vector store",
            "in memory",
            "Collections are lost when the process exits",
        )),
        VectorStoreProvider::Qdrant => results.push(check_qdrant(settings).await),
    }

    match settings.checkpoint.provider {
        CheckpointProvider::Sqlite => {
            results.push(file_check("Conversations", &settings.checkpoint_path()));
        }
        CheckpointProvider::Memory => results.push(CheckResult::warning(
            "Conversations",
            "in memory",
            "Threads are lost when the process exits",
        )),
    }

    results.push(file_check("Accounts", &settings.users_db_path()));
    results
}

async fn check_qdrant(settings: &Settings) -> CheckResult {
    let url = &settings.vector_store.qdrant_url;
    let store = match QdrantVectorStore::new(url, settings.vector_store.qdrant_api_key.clone()) {
        Ok(store) => store,
        Err(e) => return CheckResult::error("Vector store", &e.to_string(), "Check vector_store.qdrant_url"),
    };
    match store.list_collections().await {
        Ok(names) => CheckResult::ok(
            "Vector store",
            &format!("qdrant at {} ({} collections)", url, names.len()),
        ),
        Err(e) => CheckResult::error(
            "Vector store",
            &format!("qdrant at {} unreachable", url),
            &e.to_string(),
        ),
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
