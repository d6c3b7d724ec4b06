//! Slash command parsing for the chat front end.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the session without starting a turn.

use crate::aggregator::ReasoningUpdates;

/// A parsed chat command.
///
/// These commands control the session and are never sent to the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Change the model used for subsequent turns.
    Model(String),

    /// List the selectable models.
    Models,

    /// Choose which reasoning updates are shown.
    Reasoning(ReasoningUpdates),

    /// Ask the model to reason (or not) on subsequent turns.
    Thinking(bool),

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it should start a
/// turn.  The bare words `exit` and `quit` also end the session.
///
/// # Examples
///
/// ```
/// # use convocode::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("exit").is_some());
/// assert!(parse_command("/model qwen3:8b").is_some());
/// assert!(parse_command("Why is the sky blue?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
        return Some(ChatCommand::Quit);
    }
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "model" => match argument {
            Some(model) => ChatCommand::Model(model.to_string()),
            None => ChatCommand::Invalid("/model requires a model name".to_string()),
        },
        "models" => ChatCommand::Models,
        "reasoning" => match argument.map(str::parse::<ReasoningUpdates>) {
            Some(Ok(mode)) => ChatCommand::Reasoning(mode),
            Some(Err(err)) => ChatCommand::Invalid(err),
            None => ChatCommand::Invalid("/reasoning expects 'first' or 'continuous'".to_string()),
        },
        "thinking" => match argument.and_then(parse_on_off) {
            Some(value) => ChatCommand::Thinking(value),
            None => ChatCommand::Invalid("/thinking expects 'on' or 'off'".to_string()),
        },
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_on_off(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "on" | "true" | "yes" => Some(true),
        "off" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /model <name>          Change the model (e.g., /model qwen3:8b)
  /models                List selectable models
  /reasoning first|continuous
                         Show only the first reasoning update, or every one
  /thinking on|off       Ask the model to reason before answering
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat (also: exit, quit)
  Ctrl+C                 Cancel the response in progress"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
        assert_eq!(parse_command("exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("QUIT"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("quit now"), None);
    }

    #[test]
    fn parse_model() {
        assert_eq!(
            parse_command("/model qwen3:8b"),
            Some(ChatCommand::Model("qwen3:8b".to_string()))
        );
        assert_eq!(
            parse_command("/model   llama3.2:3b  "),
            Some(ChatCommand::Model("llama3.2:3b".to_string()))
        );
        assert_eq!(
            parse_command("/model"),
            Some(ChatCommand::Invalid(
                "/model requires a model name".to_string()
            ))
        );
        assert_eq!(parse_command("/models"), Some(ChatCommand::Models));
    }

    #[test]
    fn parse_reasoning_mode() {
        assert_eq!(
            parse_command("/reasoning first"),
            Some(ChatCommand::Reasoning(ReasoningUpdates::FirstOnly))
        );
        assert_eq!(
            parse_command("/reasoning continuous"),
            Some(ChatCommand::Reasoning(ReasoningUpdates::Continuous))
        );
        assert!(matches!(
            parse_command("/reasoning sometimes"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("Invalid reasoning mode")
        ));
        assert!(matches!(
            parse_command("/reasoning"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_thinking_toggle() {
        assert_eq!(
            parse_command("/thinking on"),
            Some(ChatCommand::Thinking(true))
        );
        assert_eq!(
            parse_command("/thinking off"),
            Some(ChatCommand::Thinking(false))
        );
        assert!(matches!(
            parse_command("/thinking maybe"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("expects")
        ));
    }

    #[test]
    fn parse_help_and_config() {
        assert_eq!(parse_command("/help"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
        assert_eq!(
            parse_command("/clear"),
            Some(ChatCommand::Invalid("Unknown command: /clear".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_not_empty() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/model"));
        assert!(help.contains("/reasoning"));
    }
}
