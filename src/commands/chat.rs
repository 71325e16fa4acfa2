//! The interactive chat loop.
//!
//! Reads one line at a time, runs commands against the orchestrator, and
//! sends everything else as a query. Generic over the reader and writer so
//! tests can drive it from memory.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::agent_core::QueryOrchestrator;

use super::{parse_input, Command, Input, HELP_TEXT};

const PROMPT: &str = "\nQuery: ";

/// Run the loop until `/quit` or end of input.
///
/// Provider failures are reported and the session continues; only I/O errors
/// on the terminal end the loop early.
pub async fn chat_loop<R, W>(
    orchestrator: &mut QueryOrchestrator,
    input: R,
    output: &mut W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    output
        .write_all(b"MCP client started. Type a query, or /help for commands.\n")
        .await?;

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            tracing::info!("input closed, leaving chat loop");
            break;
        };

        let reply = match parse_input(&line) {
            Input::Empty => continue,
            Input::Query(query) => match orchestrator.process_query(&query).await {
                Ok(answer) => answer,
                Err(e) => {
                    tracing::error!(error = %e, "query failed");
                    format!("Error: {e}")
                }
            },
            Input::Command(Command::Quit) => {
                output.write_all(b"Bye!\n").await?;
                break;
            }
            Input::Command(command) => run_command(orchestrator, command),
        };

        output.write_all(reply.as_bytes()).await?;
        output.write_all(b"\n").await?;
    }

    output.flush().await
}

/// Execute a non-quit command and return its output.
fn run_command(orchestrator: &mut QueryOrchestrator, command: Command) -> String {
    match command {
        Command::Clear => {
            let profile = orchestrator.conversation().active_profile().to_string();
            orchestrator.reset_role(&profile);
            "Conversation cleared.".to_string()
        }
        Command::Role(name) => {
            let known = orchestrator.conversation().profiles().contains(&name);
            orchestrator.reset_role(&name);
            if known {
                format!("Switched to role '{name}'. Conversation cleared.")
            } else {
                format!("Unknown role '{name}', using the default. Conversation cleared.")
            }
        }
        Command::RoleMissingName => "Usage: /role <name>".to_string(),
        Command::Tools => {
            let catalog = orchestrator.catalog();
            if catalog.is_empty() {
                return "No tools available.".to_string();
            }
            let mut text = format!("{} tools:", catalog.len());
            for tool in catalog {
                text.push_str(&format!("\n  {}  {}", tool.qualified_name, tool.description));
            }
            text
        }
        Command::Help => HELP_TEXT.to_string(),
        Command::Unknown(name) => {
            format!("Unknown command: {name}\nType /help for available commands")
        }
        // Handled by the loop.
        Command::Quit => String::new(),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
