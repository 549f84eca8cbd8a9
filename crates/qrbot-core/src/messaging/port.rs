use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{ChatAction, MessagingCapabilities},
    Result,
};

/// Outbound messenger port.
///
/// Telegram is the only implementation; the core delivers replies through
/// this trait so it never depends on the SDK.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    /// Send plain text (no markup parsing).
    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef>;

    /// Send an in-memory PNG as a photo with a caption.
    async fn send_photo(&self, chat_id: ChatId, png: Vec<u8>, caption: &str)
        -> Result<MessageRef>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;
}
