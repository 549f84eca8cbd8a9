use teloxide::{net::Download, prelude::*, types::FileMeta};

use qrbot_core::{
    dispatch::USAGE_HINT,
    messaging::types::{ChatAction, IncomingUpdate, PhotoMessage},
};

use crate::router::AppState;

use super::{check_rate_limit, respond, Sender};

const IMAGE_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".webp", ".gif", ".bmp"];

/// Documents are accepted when they look like an image by MIME type or name.
fn is_image_document(name: Option<&str>, mime: Option<&str>) -> bool {
    if let Some(m) = mime {
        if m.starts_with("image/") {
            return true;
        }
    }
    let Some(name) = name else {
        return false;
    };
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Reply text for files over the download cap, `None` when the size is fine.
fn oversize_message(size: u64, max: u64) -> Option<String> {
    if size <= max {
        return None;
    }
    Some(format!(
        "❌ Image too large ({:.1} MB, max {:.1} MB).",
        size as f64 / 1024.0 / 1024.0,
        max as f64 / 1024.0 / 1024.0
    ))
}

/// Pick the file to decode: the largest photo variant, or an image document.
fn image_source(msg: &Message) -> Option<&FileMeta> {
    if let Some(photos) = msg.photo() {
        // Telegram lists sizes ascending; the last one is the original resolution.
        return photos.last().map(|p| &p.file);
    }
    let doc = msg.document()?;
    let mime = doc.mime_type.as_ref().map(|m| m.essence_str().to_string());
    if is_image_document(doc.file_name.as_deref(), mime.as_deref()) {
        return Some(&doc.file);
    }
    None
}

async fn download_image(bot: &Bot, file: &FileMeta) -> anyhow::Result<Vec<u8>> {
    let file = bot.get_file(file.id.clone()).await?;
    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    Ok(buf)
}

pub(super) async fn handle_photo(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    sender: Sender,
) -> ResponseResult<()> {
    let Some(file) = image_source(msg) else {
        let _ = state.messenger.send_text(sender.chat_id, USAGE_HINT).await;
        return Ok(());
    };

    if !check_rate_limit(state, &sender).await {
        return Ok(());
    }

    let size = file.size as u64;
    if let Some(reply) = oversize_message(size, state.cfg.max_image_bytes) {
        tracing::info!(chat = sender.chat_id.0, size, "image too large");
        let _ = state.messenger.send_text(sender.chat_id, &reply).await;
        return Ok(());
    }

    let image = match download_image(bot, file).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(chat = sender.chat_id.0, "photo download failed: {e}");
            let _ = state
                .messenger
                .send_text(
                    sender.chat_id,
                    &format!(
                        "❌ Failed to download photo: {}",
                        e.to_string().chars().take(100).collect::<String>()
                    ),
                )
                .await;
            return Ok(());
        }
    };

    let content = format!("[image {} bytes]", image.len());
    let update = IncomingUpdate::Photo(PhotoMessage {
        chat_id: sender.chat_id,
        user_id: sender.user_id,
        username: sender.username,
        image,
    });

    respond(state, update, Some(ChatAction::Typing), &content).await;
    Ok(())
}
