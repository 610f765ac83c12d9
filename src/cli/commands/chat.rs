//! Chat command: talk to the agent from the terminal.

use crate::app::AppContext;
use crate::chat::TurnReply;
use crate::cli::Output;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run one turn and print the tools used and the reply.
async fn send(ctx: &AppContext, user: &str, thread: &str, input: &str) -> crate::error::Result<TurnReply> {
    let spinner = Output::spinner("Thinking...");
    let reply = ctx
        .chat
        .handle_turn(user, Some(thread), vec![input.to_string()])
        .await;
    spinner.finish_and_clear();

    let reply = reply?;
    for call in &reply.response.tool_calls {
        Output::tool_call(&call.name, call.success);
    }
    println!("\n{} {}\n", style("Agent:").cyan().bold(), reply.response.content);
    Ok(reply)
}

/// Run the chat command: one message, or an interactive session.
pub async fn run_chat(message: Option<&str>, user: &str, thread: Option<&str>, ctx: &AppContext) -> Result<()> {
    let thread = thread.unwrap_or(user);

    if let Some(message) = message {
        send(ctx, user, thread, message).await?;
        return Ok(());
    }

    let previous = ctx.chat.history(thread).await?.map(|s| s.len()).unwrap_or(0);

    println!("\n{}", style("ragchat").bold().cyan());
    if previous > 0 {
        println!("{}", style(format!("Resuming thread '{}' ({} messages).", thread, previous)).dim());
    }
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset the thread.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            ctx.chat.reset(thread).await?;
            Output::info("Conversation history cleared.");
            continue;
        }

        if let Err(e) = send(ctx, user, thread, input).await {
            Output::error(&format!("Error: {}", e));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::llm::ModelReply;
    use crate::test_support::{test_context, ScriptedModel};

    #[tokio::test]
    async fn test_one_shot_message_is_checkpointed() {
        let ctx = test_context(
            Settings::default(),
            ScriptedModel::new(vec![ModelReply::text("Hello there.")]),
        );
        run_chat(Some("hi"), "local", None, &ctx).await.unwrap();

        let state = ctx.chat.history("local").await.unwrap().unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.last_reply(), Some("Hello there."));
    }

    #[tokio::test]
    async fn test_one_shot_failure_is_reported() {
        let ctx = test_context(Settings::default(), ScriptedModel::new(vec![]));
        assert!(run_chat(Some("   "), "local", Some("t1"), &ctx).await.is_err());
        assert!(ctx.chat.history("t1").await.unwrap().is_none());
    }
}
