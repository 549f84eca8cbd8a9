use teloxide::prelude::*;

use qrbot_core::messaging::types::{Command, IncomingUpdate};

use crate::router::AppState;

use super::{respond, Sender};

pub(super) async fn handle_command(
    state: &AppState,
    sender: Sender,
    text: &str,
) -> ResponseResult<()> {
    let cmd = Command::parse(sender.chat_id, sender.user_id, sender.username, text);
    tracing::debug!(chat = cmd.chat_id.0, command = %cmd.name, "command");

    respond(state, IncomingUpdate::Command(cmd), None, text).await;
    Ok(())
}
