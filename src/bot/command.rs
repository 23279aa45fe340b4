//! Parsing of chat commands.
//!
//! Lifecycle commands accept two spellings: the combined token produced by
//! the `/list` links (`/stop_my_app`) and a separate argument
//! (`/stop my-app`).

use crate::lifecycle::executor::Operation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Lifecycle(Operation, String),
    List,
    Check(String),
    Info,
    Help,
}

/// Rejections. The `Display` text is the reply sent to the operator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("{}", crate::bot::reply::UNAUTHORIZED)]
    Unauthorized,
    #[error("ℹ️ Please specify a container name: /{0} container_name")]
    MissingName(String),
    #[error("❌ Unknown command: {0}")]
    Unknown(String),
}

/// Only messages starting with `/` are commands; anything else is ignored.
pub fn is_command(text: &str) -> bool {
    text.trim_start().starts_with('/')
}

pub fn parse(text: &str) -> Result<Command, CommandError> {
    let mut parts = text.split_whitespace();
    let word = parts.next().unwrap_or_default();
    let word = word.strip_prefix('/').unwrap_or(word);
    // Group chats address commands as `/list@my_bot`.
    let word = word.split_once('@').map_or(word, |(word, _)| word);
    let argument = parts.next();

    let require_name = |command: &str| {
        argument
            .map(str::to_string)
            .ok_or_else(|| CommandError::MissingName(command.to_string()))
    };

    match word {
        "list" => return Ok(Command::List),
        "info" => return Ok(Command::Info),
        "help" => return Ok(Command::Help),
        "check" => return require_name(word).map(Command::Check),
        _ => {}
    }

    if let Ok(operation) = word.parse::<Operation>() {
        return require_name(word).map(|name| Command::Lifecycle(operation, name));
    }

    match word.split_once('_') {
        Some((token, name)) => {
            let operation = token
                .parse::<Operation>()
                .map_err(|_| CommandError::Unknown(token.to_string()))?;
            if name.is_empty() {
                return Err(CommandError::MissingName(token.to_string()));
            }
            Ok(Command::Lifecycle(operation, name.to_string()))
        }
        None => Err(CommandError::Unknown(word.to_string())),
    }
}
