//! Line-oriented operator commands read from stdin.

use std::path::PathBuf;

use livetrack::events::{ReactionAction, UserStatus};

pub const HELP: &str = "\
commands:
  <text>                     send a chat message
  /typing                    show the typing indicator
  /react <message-id> <emoji>
  /unreact <message-id> <emoji>
  /status online|away|offline
  /active on|off
  /select <user-id>          select and recenter
  /follow on|off             auto-follow the selected user
  /record start|stop         local route recording
  /export [dir]              write live-tracking-<date>.json
  /users                     list the roster
  /reconnect                 reconnect after giving up
  /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    Chat(String),
    Typing,
    React {
        message_id: String,
        emoji: String,
        action: ReactionAction,
    },
    Status(UserStatus),
    Active(bool),
    Select(String),
    Follow(bool),
    Record(bool),
    Export(Option<PathBuf>),
    Users,
    Reconnect,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("unknown command /{0}; try /help")]
    UnknownCommand(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Parse one stdin line. Anything not starting with `/` is chat text.
pub fn parse_line(line: &str) -> Result<Input, InputError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let Some(command) = line.strip_prefix('/') else {
        return Ok(Input::Chat(line.to_owned()));
    };

    let mut words = command.split_whitespace();
    let name = words.next().unwrap_or_default();
    let args: Vec<&str> = words.collect();

    match (name, args.as_slice()) {
        ("typing", []) => Ok(Input::Typing),
        ("react" | "unreact", [message_id, emoji]) => Ok(Input::React {
            message_id: (*message_id).to_owned(),
            emoji: (*emoji).to_owned(),
            action: if name == "react" {
                ReactionAction::Add
            } else {
                ReactionAction::Remove
            },
        }),
        ("react" | "unreact", _) => Err(InputError::Usage("/react <message-id> <emoji>")),
        ("status", ["online"]) => Ok(Input::Status(UserStatus::Online)),
        ("status", ["away"]) => Ok(Input::Status(UserStatus::Away)),
        ("status", ["offline"]) => Ok(Input::Status(UserStatus::Offline)),
        ("status", _) => Err(InputError::Usage("/status online|away|offline")),
        ("active", [toggle]) => on_off(toggle)
            .map(Input::Active)
            .ok_or(InputError::Usage("/active on|off")),
        ("select", [user_id]) => Ok(Input::Select((*user_id).to_owned())),
        ("select", _) => Err(InputError::Usage("/select <user-id>")),
        ("follow", [toggle]) => on_off(toggle)
            .map(Input::Follow)
            .ok_or(InputError::Usage("/follow on|off")),
        ("record", ["start"]) => Ok(Input::Record(true)),
        ("record", ["stop"]) => Ok(Input::Record(false)),
        ("record", _) => Err(InputError::Usage("/record start|stop")),
        ("export", []) => Ok(Input::Export(None)),
        ("export", [dir]) => Ok(Input::Export(Some(PathBuf::from(dir)))),
        ("users", []) => Ok(Input::Users),
        ("reconnect", []) => Ok(Input::Reconnect),
        ("help", _) => Ok(Input::Help),
        ("quit" | "exit", []) => Ok(Input::Quit),
        (other, _) => Err(InputError::UnknownCommand(other.to_owned())),
    }
}

fn on_off(word: &str) -> Option<bool> {
    match word {
        "on" => Some(true),
        "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[path = "console_test.rs"]
mod tests;
