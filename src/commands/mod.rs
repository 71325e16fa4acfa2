//! Interactive command surface.
//!
//! Lines starting with `/` are commands; anything else is a query for the
//! orchestrator.

pub mod chat;

pub use chat::chat_loop;

/// Prefix that marks a line as a command.
pub const COMMAND_PREFIX: char = '/';

/// A parsed `/` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reset the conversation under the current profile.
    Clear,
    /// Reset the conversation under a named profile.
    Role(String),
    /// `/role` without a name.
    RoleMissingName,
    Tools,
    Help,
    Quit,
    Unknown(String),
}

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Command(Command),
    Query(String),
}

/// Classify one input line.
pub fn parse_input(line: &str) -> Input {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Input::Empty;
    }
    if !trimmed.starts_with(COMMAND_PREFIX) {
        return Input::Query(trimmed.to_string());
    }

    let mut words = trimmed.split_whitespace();
    let name = words.next().unwrap_or_default();
    let arg = words.next();

    let command = match name {
        "/clear" => Command::Clear,
        "/role" => match arg {
            Some(profile) => Command::Role(profile.to_string()),
            None => Command::RoleMissingName,
        },
        "/tools" => Command::Tools,
        "/help" | "/?" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    };
    Input::Command(command)
}

/// Text printed by `/help`.
pub const HELP_TEXT: &str = "\
Commands:
  /clear          Start a new conversation with the current role
  /role <name>    Start a new conversation with the named role profile
  /tools          List the tools offered to the model
  /help           Show this help
  /quit, /exit    Exit
Anything else is sent to the model as a query.";
