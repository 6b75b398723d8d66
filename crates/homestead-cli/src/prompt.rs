use anyhow::Result;
use homestead::models::conversation::Conversation;
use homestead::models::message::Message;
use uuid::Uuid;

pub mod cliclack;

/// Terminal side of a chat session
pub trait Prompt {
    /// Render a finished message as markdown
    fn render(&mut self, message: &Message);
    /// Echo part of an answer that is still arriving
    fn stream_delta(&mut self, delta: &str);
    /// The answer is complete; remove the raw echo
    fn end_stream(&mut self);
    fn get_input(&mut self) -> Result<Input>;
    fn show_busy(&mut self);
    fn hide_busy(&mut self);
    fn info(&mut self, message: &str);
    fn error(&mut self, message: &str);
    fn render_conversations(&mut self, conversations: &[Conversation], active: Option<Uuid>);
    fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Nothing usable was entered; ask again
    AskAgain,
    Message(String),
    New,
    List,
    Open(Uuid),
    Delete(Uuid),
    Help,
    /// A command was recognized but its argument was not
    Invalid(String),
    Exit,
}

pub const HELP: &str = "\
/new          Start a new conversation
/list         List your conversations
/open <id>    Continue a conversation
/delete <id>  Delete a conversation
/t            Toggle light and dark theme
/exit         Leave the session
/?            Show this help";

fn conversation_id(command: &str, argument: &str) -> std::result::Result<Uuid, String> {
    if argument.is_empty() {
        return Err(format!("Usage: {} <conversation id>", command));
    }
    Uuid::parse_str(argument).map_err(|_| format!("Not a conversation id: {}", argument))
}

/// Turn a line typed at the chat prompt into an [`Input`]
pub fn parse_input(text: &str) -> Input {
    let text = text.trim();
    if text.is_empty() {
        return Input::AskAgain;
    }
    if !text.starts_with('/') {
        return Input::Message(text.to_string());
    }

    let (command, argument) = match text.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (text, ""),
    };
    match command.to_ascii_lowercase().as_str() {
        "/exit" | "/quit" => Input::Exit,
        "/new" => Input::New,
        "/list" => Input::List,
        "/?" | "/help" => Input::Help,
        "/open" => conversation_id(command, argument)
            .map(Input::Open)
            .unwrap_or_else(Input::Invalid),
        "/delete" => conversation_id(command, argument)
            .map(Input::Delete)
            .unwrap_or_else(Input::Invalid),
        // not a command we know, so it is part of the question
        _ => Input::Message(text.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            parse_input("  What is a title search? "),
            Input::Message("What is a title search?".into())
        );
        assert_eq!(
            parse_input("/2 bedroom rentals"),
            Input::Message("/2 bedroom rentals".into())
        );
        assert_eq!(parse_input("   "), Input::AskAgain);
    }

    #[test]
    fn test_commands() {
        assert_eq!(parse_input("/exit"), Input::Exit);
        assert_eq!(parse_input("/QUIT"), Input::Exit);
        assert_eq!(parse_input("/new"), Input::New);
        assert_eq!(parse_input("/list"), Input::List);
        assert_eq!(parse_input("/?"), Input::Help);
    }

    #[test]
    fn test_commands_with_ids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_input(&format!("/open {}", id)), Input::Open(id));
        assert_eq!(parse_input(&format!("/delete  {} ", id)), Input::Delete(id));
        assert_eq!(
            parse_input("/open"),
            Input::Invalid("Usage: /open <conversation id>".into())
        );
        assert_eq!(
            parse_input("/delete 42"),
            Input::Invalid("Not a conversation id: 42".into())
        );
    }
}
