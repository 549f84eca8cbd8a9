use crate::domain::{ChatId, UserId};

/// Messenger-neutral inbound update, with payloads already extracted.
///
/// Telegram-specific fields stay in the Telegram adapter; photo bytes are
/// downloaded before an update is built.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
    Photo(PhotoMessage),
}

impl IncomingUpdate {
    pub fn chat_id(&self) -> ChatId {
        match self {
            Self::Command(c) => c.chat_id,
            Self::Text(t) => t.chat_id,
            Self::Photo(p) => p.chat_id,
        }
    }

    pub fn user_id(&self) -> UserId {
        match self {
            Self::Command(c) => c.user_id,
            Self::Text(t) => t.user_id,
            Self::Photo(p) => p.user_id,
        }
    }

    /// Short label for logs and audit entries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "COMMAND",
            Self::Text(_) => "TEXT",
            Self::Photo(_) => "PHOTO",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub name: String,
}

impl Command {
    /// Parse `/cmd@botname ...` into a lowercase command name.
    pub fn parse(chat_id: ChatId, user_id: UserId, username: Option<String>, text: &str) -> Self {
        let first = text.split_whitespace().next().unwrap_or("");
        let name = first
            .trim_start_matches('/')
            .split('@')
            .next()
            .unwrap_or("")
            .to_lowercase();

        Self {
            chat_id,
            user_id,
            username,
            name,
        }
    }

    /// Whether `text` starts with a Telegram command token: `/name` or
    /// `/name@bot`, with 1 to 32 word characters in `name`.
    ///
    /// Paths such as `/home/user/file` are plain text.
    pub fn is_command_text(text: &str) -> bool {
        let Some(token) = text.split_whitespace().next() else {
            return false;
        };
        let Some(rest) = token.strip_prefix('/') else {
            return false;
        };
        let (name, bot) = match rest.split_once('@') {
            Some((name, bot)) => (name, Some(bot)),
            None => (rest, None),
        };

        let is_word = |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        let name_ok = (1..=32).contains(&name.len()) && is_word(name);
        let bot_ok = bot.map_or(true, |b| !b.is_empty() && is_word(b));
        name_ok && bot_ok
    }
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

#[derive(Clone, Debug)]
pub struct PhotoMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    /// Raw bytes of the largest photo variant (or an image document).
    pub image: Vec<u8>,
}

/// Outgoing "chat action" (typing indicator, etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadPhoto,
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_chat_actions: bool,
    pub max_message_len: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(text: &str) -> Command {
        Command::parse(ChatId(1), UserId(2), None, text)
    }

    #[test]
    fn parses_plain_command() {
        let c = cmd("/start");
        assert_eq!(c.name, "start");
    }

    #[test]
    fn strips_bot_mention_and_args() {
        let c = cmd("/Help@qr_bot  some  args ");
        assert_eq!(c.name, "help");
    }

    #[test]
    fn recognizes_command_tokens() {
        assert!(Command::is_command_text("/start"));
        assert!(Command::is_command_text("/help@qr_bot"));
        assert!(Command::is_command_text("/start deep_link_payload"));
        assert!(Command::is_command_text("/my_cmd_2 x"));
    }

    #[test]
    fn paths_and_slashes_are_not_commands() {
        assert!(!Command::is_command_text("/home/user/file"));
        assert!(!Command::is_command_text("/"));
        assert!(!Command::is_command_text("/ start"));
        assert!(!Command::is_command_text("/start@"));
        assert!(!Command::is_command_text("/caf\u{e9}"));
        assert!(!Command::is_command_text("https://example.com/start"));
        assert!(!Command::is_command_text(&format!("/{}", "a".repeat(33))));
        assert!(!Command::is_command_text(""));
    }

    #[test]
    fn update_accessors() {
        let u = IncomingUpdate::Photo(PhotoMessage {
            chat_id: ChatId(10),
            user_id: UserId(20),
            username: Some("u".to_string()),
            image: vec![],
        });
        assert_eq!(u.chat_id(), ChatId(10));
        assert_eq!(u.user_id(), UserId(20));
        assert_eq!(u.kind(), "PHOTO");
    }
}
