use crate::options::{AspectRatio, Resolution, StudioMode};

use super::command_registry::{find_action, NO_ARG_COMMANDS, PATH_COMMANDS, VALUE_COMMANDS};

/// One line of input to the interactive studio, parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioCommand {
    Noop,
    /// Plain text: becomes the prompt and triggers the primary action.
    Submit { prompt: String },
    SetMode(StudioMode),
    SetModel(String),
    SetAspectRatio(AspectRatio),
    SetResolution(Resolution),
    SetSource(String),
    ClearSource,
    History,
    Delete(String),
    Download { id: String, dir: Option<String> },
    Status,
    Help,
    Quit,
    Invalid { command: String, message: String },
    Unknown { command: String, arg: String },
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts
            .into_iter()
            .filter(|value| !value.is_empty())
            .collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn invalid(command: &str, message: impl Into<String>) -> StudioCommand {
    StudioCommand::Invalid {
        command: command.to_string(),
        message: message.into(),
    }
}

fn value_command(action: &str, command: &str, arg: &str) -> StudioCommand {
    if arg.is_empty() {
        return invalid(command, format!("/{command} needs a value"));
    }
    match action {
        "set_mode" => arg
            .parse()
            .map(StudioCommand::SetMode)
            .unwrap_or_else(|err| invalid(command, err)),
        "set_aspect_ratio" => arg
            .parse()
            .map(StudioCommand::SetAspectRatio)
            .unwrap_or_else(|err| invalid(command, err)),
        "set_resolution" => arg
            .parse()
            .map(StudioCommand::SetResolution)
            .unwrap_or_else(|err| invalid(command, err)),
        "set_model" => StudioCommand::SetModel(arg.to_string()),
        "delete" => StudioCommand::Delete(arg.to_string()),
        _ => unknown(command, arg),
    }
}

fn unknown(command: &str, arg: &str) -> StudioCommand {
    StudioCommand::Unknown {
        command: command.to_string(),
        arg: arg.to_string(),
    }
}

fn path_command(action: &str, command: &str, arg: &str) -> StudioCommand {
    let mut parts = parse_path_args(arg);
    if parts.is_empty() {
        return invalid(command, format!("/{command} needs a path or id"));
    }
    match action {
        "download" => {
            let id = parts.remove(0);
            let dir = if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            };
            StudioCommand::Download { id, dir }
        }
        "set_source" => StudioCommand::SetSource(parts.join(" ")),
        _ => unknown(command, arg),
    }
}

pub fn parse_command(text: &str) -> StudioCommand {
    let raw_trimmed = text.trim();
    if raw_trimmed.is_empty() {
        return StudioCommand::Noop;
    }
    // `//text` submits `/text` as a prompt.
    if let Some(escaped) = raw_trimmed.strip_prefix("//") {
        let prompt = escaped.trim_end();
        if prompt.trim().is_empty() {
            return StudioCommand::Noop;
        }
        return StudioCommand::Submit {
            prompt: format!("/{prompt}"),
        };
    }

    if let Some(slash_tail) = raw_trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some(action) = find_action(&command, VALUE_COMMANDS) {
                return value_command(action, &command, arg);
            }

            if let Some(action) = find_action(&command, PATH_COMMANDS) {
                return path_command(action, &command, arg);
            }

            if let Some(action) = find_action(&command, NO_ARG_COMMANDS) {
                return match action {
                    "clear_source" => StudioCommand::ClearSource,
                    "history" => StudioCommand::History,
                    "status" => StudioCommand::Status,
                    "help" => StudioCommand::Help,
                    "quit" => StudioCommand::Quit,
                    _ => unknown(&command, arg),
                };
            }

            return unknown(&command, arg);
        }
    }

    StudioCommand::Submit {
        prompt: raw_trimmed.to_string(),
    }
}
