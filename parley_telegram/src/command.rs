use teloxide::types::BotCommand;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    /// `/ask <question>`; the question may be empty.
    Ask(String),
}

impl Command {
    fn all() -> Vec<BotCommand> {
        vec![
            BotCommand {
                command: "ask".to_string(),
                description: "Ask the assistant a question".to_string(),
            },
            BotCommand {
                command: "start".to_string(),
                description: "Start talking to the bot".to_string(),
            },
            BotCommand {
                command: "help".to_string(),
                description: "Show help".to_string(),
            },
        ]
    }

    #[must_use]
    pub fn bot_commands() -> Vec<BotCommand> {
        Self::all()
    }

    /// Parse a slash command, ignoring a trailing `@bot_name` mention.
    ///
    /// Returns `None` for plain text and for unknown commands.
    #[must_use]
    pub fn parse_from_text(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, rest) = text
            .split_once(char::is_whitespace)
            .map_or((text, ""), |(head, rest)| (head, rest.trim()));

        let name = head.strip_prefix('/')?;
        let name = name.split_once('@').map_or(name, |(name, _)| name);

        match name.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "help" => Some(Self::Help),
            "ask" => Some(Self::Ask(rest.to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub const fn help_text() -> &'static str {
        r"
🤖 Parley

Commands:
/ask <question> - ask the assistant a question
/start - show the welcome message
/help  - show this help

You can also just send a message. The bot remembers your conversation until it restarts.
"
    }

    #[must_use]
    pub const fn welcome_text() -> &'static str {
        r"
👋 Welcome to Parley!

Ask me anything with /ask <question>, or just send a message.

Send /help to see all commands.
"
    }

    #[must_use]
    pub const fn usage_text() -> &'static str {
        "Usage: /ask <question>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse_from_text("/start"), Some(Command::Start));
        assert_eq!(Command::parse_from_text("  /HELP "), Some(Command::Help));
        assert_eq!(
            Command::parse_from_text("/ask what is rust?"),
            Some(Command::Ask("what is rust?".to_string()))
        );
    }

    #[test]
    fn strips_bot_mention() {
        assert_eq!(
            Command::parse_from_text("/ask@parley_bot  two  words "),
            Some(Command::Ask("two  words".to_string()))
        );
        assert_eq!(Command::parse_from_text("/start@parley_bot"), Some(Command::Start));
    }

    #[test]
    fn ask_without_question_is_empty() {
        assert_eq!(
            Command::parse_from_text("/ask"),
            Some(Command::Ask(String::new()))
        );
    }

    #[test]
    fn plain_text_and_unknown_commands_are_none() {
        assert_eq!(Command::parse_from_text("hello there"), None);
        assert_eq!(Command::parse_from_text("/reset"), None);
        assert_eq!(Command::parse_from_text(""), None);
    }

    #[test]
    fn every_parsed_command_is_registered() {
        let names: Vec<String> = Command::bot_commands()
            .into_iter()
            .map(|c| c.command)
            .collect();
        assert_eq!(names, ["ask", "start", "help"]);
    }
}
