//! Slash command parsing for the chat loop.
//!
//! A command is recognized only when it is the entire trimmed line and
//! matches exactly; anything else is chat text.

/// In-chat controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatCommand {
    /// Discard the conversation history.
    Clear,
    /// End the chat session.
    Quit,
    /// Show available commands.
    Help,
}

/// One classified line of user input.
#[derive(Debug, PartialEq, Eq)]
pub enum Input<'a> {
    /// Blank line, ignored.
    Empty,
    Command(ChatCommand),
    /// Trimmed chat text.
    Message(&'a str),
}

/// Classify a line read from the user.
#[must_use]
pub fn parse(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/clear" => Input::Command(ChatCommand::Clear),
        "/quit" | "/exit" => Input::Command(ChatCommand::Quit),
        "/help" => Input::Command(ChatCommand::Help),
        text => Input::Message(text),
    }
}
