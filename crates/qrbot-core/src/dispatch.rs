//! Inbound update → reply dispatch.
//!
//! Every arm is synchronous and calls one pure QR function; transports decide
//! where to run it and how to deliver the resulting [`Reply`].

use crate::{
    domain::ChatId,
    messaging::{port::MessagingPort, types::IncomingUpdate},
    qr::{self, DecodeResult, EncodingError, QrOptions, RasterImage},
    utils::split_text_chunks,
    Result,
};

pub const START_MESSAGE: &str = "👋 Hello! I can generate and read QR codes.\n\n\
➡️ Send me any text or link to get its QR code.\n\
📸 Or send a photo of a QR code and I’ll decode it for you.";

pub const QR_CAPTION: &str = "Here’s your QR code! 📦";
pub const DECODED_PREFIX: &str = "Decoded QR:\n";
pub const NO_QR_MESSAGE: &str = "No QR code detected.";
pub const BAD_IMAGE_MESSAGE: &str =
    "❌ Couldn't process that image. Please send a JPEG or PNG photo.";
pub const EMPTY_TEXT_MESSAGE: &str = "Send me some text or a link to turn into a QR code.";
pub const USAGE_HINT: &str =
    "I only understand text (to make a QR code) and photos (to read one). Send /start for help.";

/// What the transport should send back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Photo { image: RasterImage, caption: String },
}

/// Stateless dispatch table over [`IncomingUpdate`].
#[derive(Clone, Debug)]
pub struct QrBot {
    options: QrOptions,
    max_decode_dim: u32,
}

impl Default for QrBot {
    fn default() -> Self {
        Self::new(QrOptions::default(), qr::DEFAULT_MAX_DECODE_DIM)
    }
}

impl QrBot {
    /// `max_decode_dim` bounds the longest image side fed to detection
    /// (`0` = full resolution).
    pub fn new(options: QrOptions, max_decode_dim: u32) -> Self {
        Self {
            options,
            max_decode_dim,
        }
    }

    /// `None` means the update is ignored (unknown command).
    pub fn handle(&self, update: &IncomingUpdate) -> Option<Reply> {
        match update {
            IncomingUpdate::Command(c) => match c.name.as_str() {
                "start" | "help" => Some(Reply::Text(START_MESSAGE.to_string())),
                _ => None,
            },
            IncomingUpdate::Text(t) => Some(self.encode_text(&t.text)),
            IncomingUpdate::Photo(p) => Some(self.decode_image(&p.image)),
        }
    }

    pub fn encode_text(&self, text: &str) -> Reply {
        match qr::encode(text.trim(), &self.options) {
            Ok(image) => Reply::Photo {
                image,
                caption: QR_CAPTION.to_string(),
            },
            Err(e) => Reply::Text(encoding_error_message(&e)),
        }
    }

    pub fn decode_image(&self, image_bytes: &[u8]) -> Reply {
        match qr::decode_scaled(image_bytes, self.max_decode_dim) {
            Ok(DecodeResult::DecodedText(s)) => Reply::Text(format!("{DECODED_PREFIX}{s}")),
            Ok(DecodeResult::NotFound) => Reply::Text(NO_QR_MESSAGE.to_string()),
            Err(_) => Reply::Text(BAD_IMAGE_MESSAGE.to_string()),
        }
    }
}

fn encoding_error_message(e: &EncodingError) -> String {
    match e {
        EncodingError::EmptyPayload => EMPTY_TEXT_MESSAGE.to_string(),
        EncodingError::DataTooLong { len } => format!(
            "❌ That text is too long for a QR code ({len} bytes). Try something shorter."
        ),
        EncodingError::TooLarge { .. } => {
            "❌ That QR code would be too large to send. Try a shorter text.".to_string()
        }
        EncodingError::Symbol(_) | EncodingError::Render(_) => {
            "❌ Couldn't create a QR code. Please try again.".to_string()
        }
    }
}

/// Send `reply` to `chat_id`, splitting long text to the messenger's limit.
pub async fn deliver(
    messenger: &dyn MessagingPort,
    chat_id: ChatId,
    reply: Reply,
    limit: usize,
) -> Result<()> {
    match reply {
        Reply::Photo { image, caption } => {
            messenger
                .send_photo(chat_id, image.into_bytes(), &caption)
                .await?;
        }
        Reply::Text(text) => {
            let limit = limit.min(messenger.capabilities().max_message_len);
            for chunk in split_text_chunks(&text, limit) {
                messenger.send_text(chat_id, &chunk).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use image::{codecs::png::PngEncoder, ColorType, GrayImage, ImageEncoder, Luma};

    use super::*;
    use crate::{
        domain::{MessageId, MessageRef, UserId},
        messaging::types::{ChatAction, Command, MessagingCapabilities, PhotoMessage, TextMessage},
    };

    fn text(s: &str) -> IncomingUpdate {
        IncomingUpdate::Text(TextMessage {
            chat_id: ChatId(1),
            user_id: UserId(1),
            username: None,
            text: s.to_string(),
        })
    }

    fn photo(bytes: Vec<u8>) -> IncomingUpdate {
        IncomingUpdate::Photo(PhotoMessage {
            chat_id: ChatId(1),
            user_id: UserId(1),
            username: None,
            image: bytes,
        })
    }

    fn command(s: &str) -> IncomingUpdate {
        IncomingUpdate::Command(Command::parse(ChatId(1), UserId(1), None, s))
    }

    #[test]
    fn start_and_help_greet() {
        let bot = QrBot::default();
        let greeting = Some(Reply::Text(START_MESSAGE.to_string()));
        assert_eq!(bot.handle(&command("/start")), greeting);
        assert_eq!(bot.handle(&command("/help@qr_bot")), greeting);
        assert_eq!(bot.handle(&command("/unknown")), None);
    }

    #[test]
    fn text_becomes_photo_that_decodes_back() {
        let bot = QrBot::default();
        let Some(Reply::Photo { image, caption }) = bot.handle(&text("  https://example.com  "))
        else {
            panic!("expected photo reply");
        };
        assert_eq!(caption, QR_CAPTION);

        let reply = bot.handle(&photo(image.png));
        assert_eq!(
            reply,
            Some(Reply::Text("Decoded QR:\nhttps://example.com".to_string()))
        );
    }

    #[test]
    fn blank_text_asks_for_input() {
        let bot = QrBot::default();
        assert_eq!(
            bot.handle(&text("   \n ")),
            Some(Reply::Text(EMPTY_TEXT_MESSAGE.to_string()))
        );
    }

    #[test]
    fn oversized_text_reports_length() {
        let bot = QrBot::default();
        let Some(Reply::Text(msg)) = bot.handle(&text(&"y".repeat(4000))) else {
            panic!("expected text reply");
        };
        assert!(msg.contains("too long"));
        assert!(msg.contains("4000 bytes"));
    }

    #[test]
    fn oversized_render_is_reported_not_panicked() {
        let bot = QrBot::new(
            QrOptions {
                module_size: u32::MAX / 4,
                ..QrOptions::default()
            },
            qr::DEFAULT_MAX_DECODE_DIM,
        );
        let Some(Reply::Text(msg)) = bot.handle(&text("hello")) else {
            panic!("expected text reply");
        };
        assert!(msg.contains("too large to send"));
    }

    #[test]
    fn image_errors_and_misses_are_distinct() {
        let bot = QrBot::default();
        assert_eq!(
            bot.handle(&photo(b"garbage".to_vec())),
            Some(Reply::Text(BAD_IMAGE_MESSAGE.to_string()))
        );

        let blank = GrayImage::from_pixel(64, 64, Luma([255]));
        let mut png = Vec::new();
        PngEncoder::new(&mut png)
            .write_image(blank.as_raw(), 64, 64, ColorType::L8)
            .unwrap();
        assert_eq!(
            bot.handle(&photo(png)),
            Some(Reply::Text(NO_QR_MESSAGE.to_string()))
        );
    }

    #[derive(Default)]
    struct FakeMessenger {
        texts: Mutex<Vec<String>>,
        photos: Mutex<Vec<(usize, String)>>,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_chat_actions: false,
                max_message_len: 10,
            }
        }

        async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<MessageRef> {
            self.texts.lock().unwrap().push(text.to_string());
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn send_photo(
            &self,
            chat_id: ChatId,
            png: Vec<u8>,
            caption: &str,
        ) -> Result<MessageRef> {
            self.photos
                .lock()
                .unwrap()
                .push((png.len(), caption.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(2),
            })
        }

        async fn send_chat_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn deliver_splits_long_text_to_messenger_limit() {
        let fake = FakeMessenger::default();
        deliver(&fake, ChatId(1), Reply::Text("a".repeat(25)), 4096)
            .await
            .unwrap();
        let texts = fake.texts.lock().unwrap().clone();
        assert_eq!(texts.len(), 3);
        assert_eq!(texts.concat(), "a".repeat(25));
    }

    #[tokio::test]
    async fn deliver_sends_photo_with_caption() {
        let fake = FakeMessenger::default();
        let reply = QrBot::default().encode_text("hi");
        deliver(&fake, ChatId(1), reply, 4096).await.unwrap();
        let photos = fake.photos.lock().unwrap().clone();
        assert_eq!(photos.len(), 1);
        assert!(photos[0].0 > 0);
        assert_eq!(photos[0].1, QR_CAPTION);
    }
}
