//! Telegram update handlers.
//!
//! Each handler is a small adapter that:
//! - validates auth + rate limits
//! - extracts the payload (text, downloaded image bytes) into an `IncomingUpdate`
//! - runs the core dispatch table on the blocking pool and delivers the reply

use std::sync::Arc;

use teloxide::{
    prelude::*,
    types::{Message, MessageEntityKind},
};

use qrbot_core::{
    dispatch::{deliver, Reply, USAGE_HINT},
    domain::{ChatId, UserId},
    messaging::types::{ChatAction, Command, IncomingUpdate},
    security::is_authorized,
    utils::AuditEvent,
};

use crate::router::AppState;

mod commands;
mod photo;
mod text;

/// Who sent a message, as the audit log and rate limiter see it.
#[derive(Clone, Debug)]
pub(crate) struct Sender {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
}

impl Sender {
    fn from_message(msg: &Message) -> Self {
        let user = msg.from();
        Self {
            chat_id: ChatId(msg.chat.id.0),
            user_id: UserId(user.map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0)),
            username: user.and_then(|u| u.username.clone()),
        }
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or("unknown")
    }
}

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized. Contact the bot owner for access.";

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let sender = Sender::from_message(&msg);

    let from = msg.from().map(|u| UserId(u.id.0 as i64));
    if !authorize(&state, &sender, from).await {
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if is_command(&msg, text) {
            return commands::handle_command(&state, sender, text).await;
        }
        return text::handle_text(&state, sender, text).await;
    }

    if msg.photo().is_some() || msg.document().is_some() {
        return photo::handle_photo(&bot, &msg, &state, sender).await;
    }

    tracing::debug!(chat = sender.chat_id.0, "ignoring unsupported message kind");
    let _ = state.messenger.send_text(sender.chat_id, USAGE_HINT).await;
    Ok(())
}

/// A leading `/word` is a command only when Telegram tagged it as one;
/// anything else (paths, URLs) is text to encode.
fn is_command(msg: &Message, text: &str) -> bool {
    if !Command::is_command_text(text) {
        return false;
    }
    match msg.entities() {
        Some(entities) => entities
            .iter()
            .any(|e| e.offset == 0 && matches!(e.kind, MessageEntityKind::BotCommand)),
        None => true,
    }
}

/// Allow-list check; replies and audits on denial.
async fn authorize(state: &AppState, sender: &Sender, from: Option<UserId>) -> bool {
    if is_authorized(from, &state.cfg.telegram_allowed_users) {
        return true;
    }

    tracing::info!(user = sender.user_id.0, "rejected unauthorized user");
    audit(
        state,
        AuditEvent::auth(sender.user_id.0, sender.display_name(), false),
    );
    let _ = state
        .messenger
        .send_text(sender.chat_id, UNAUTHORIZED_MESSAGE)
        .await;
    false
}

/// Token-bucket check; replies and audits on denial.
async fn check_rate_limit(state: &AppState, sender: &Sender) -> bool {
    let (ok, retry_after) = {
        let mut rl = state.rate_limiter.lock().await;
        rl.check(sender.user_id)
    };
    if ok {
        return true;
    }

    let retry = retry_after.unwrap_or_default().as_secs_f64();
    tracing::info!(user = sender.user_id.0, retry, "rate limited");
    audit(
        state,
        AuditEvent::rate_limit(sender.user_id.0, sender.display_name(), retry),
    );
    let _ = state
        .messenger
        .send_text(
            sender.chat_id,
            &format!("⏳ Rate limited. Please wait {retry:.1} seconds."),
        )
        .await;
    false
}

/// Run the core dispatch table for `update` and deliver whatever it returns.
async fn respond(
    state: &AppState,
    update: IncomingUpdate,
    action: Option<ChatAction>,
    content: &str,
) {
    let chat_id = update.chat_id();
    let user_id = update.user_id();
    let kind = update.kind();
    let username = match &update {
        IncomingUpdate::Command(c) => c.username.clone(),
        IncomingUpdate::Text(t) => t.username.clone(),
        IncomingUpdate::Photo(p) => p.username.clone(),
    }
    .unwrap_or_else(|| "unknown".to_string());

    if let Some(action) = action {
        if state.messenger.capabilities().supports_chat_actions {
            let _ = state.messenger.send_chat_action(chat_id, action).await;
        }
    }

    let qr = state.qr.clone();
    let reply = match tokio::task::spawn_blocking(move || qr.handle(&update)).await {
        Ok(Some(reply)) => reply,
        Ok(None) => {
            tracing::debug!(kind, chat = chat_id.0, "update ignored");
            return;
        }
        Err(e) => {
            tracing::error!(kind, chat = chat_id.0, "qr worker failed: {e}");
            audit(
                state,
                AuditEvent::error(user_id.0, &username, &e.to_string(), Some(kind)),
            );
            let _ = state
                .messenger
                .send_text(chat_id, "❌ Something went wrong. Please try again.")
                .await;
            return;
        }
    };

    let summary = match &reply {
        Reply::Text(t) => t.clone(),
        Reply::Photo { image, .. } => format!(
            "[qr {}x{} px, {} modules, {} bytes]",
            image.width,
            image.height,
            image.modules,
            image.png.len()
        ),
    };
    tracing::info!(kind, chat = chat_id.0, "{}", summary.lines().next().unwrap_or(""));
    audit(
        state,
        AuditEvent::message(user_id.0, &username, kind, content, Some(&summary)),
    );

    if let Err(e) = deliver(
        state.messenger.as_ref(),
        chat_id,
        reply,
        state.cfg.telegram_message_limit,
    )
    .await
    {
        tracing::warn!(kind, chat = chat_id.0, "failed to deliver reply: {e}");
        audit(
            state,
            AuditEvent::error(user_id.0, &username, &e.to_string(), Some("deliver")),
        );
    }
}

fn audit(state: &AppState, event: AuditEvent) {
    if let Err(e) = state.audit.write(event) {
        tracing::warn!("[AUDIT] Failed to write event: {e}");
    }
}
