use teloxide::prelude::*;

use qrbot_core::messaging::types::{ChatAction, IncomingUpdate, TextMessage};

use crate::router::AppState;

use super::{check_rate_limit, respond, Sender};

pub(super) async fn handle_text(
    state: &AppState,
    sender: Sender,
    text: &str,
) -> ResponseResult<()> {
    if !check_rate_limit(state, &sender).await {
        return Ok(());
    }

    let update = IncomingUpdate::Text(TextMessage {
        chat_id: sender.chat_id,
        user_id: sender.user_id,
        username: sender.username,
        text: text.to_string(),
    });

    respond(state, update, Some(ChatAction::UploadPhoto), text).await;
    Ok(())
}
