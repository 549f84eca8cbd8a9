use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use tokio::sync::Mutex;

use qrbot_core::messaging::throttled::{ThrottleConfig, ThrottledMessenger};
use qrbot_core::{
    config::Config, dispatch::QrBot, messaging::port::MessagingPort, security::RateLimiter,
    utils::AuditLogger,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub qr: Arc<QrBot>,
    pub messenger: Arc<dyn MessagingPort>,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
    pub audit: Arc<AuditLogger>,
}

impl AppState {
    pub fn new(cfg: Arc<Config>, messenger: Arc<dyn MessagingPort>) -> Self {
        Self {
            qr: Arc::new(QrBot::new(cfg.qr, cfg.max_decode_dim)),
            messenger,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                cfg.rate_limit_enabled,
                cfg.rate_limit_requests,
                cfg.rate_limit_window,
            ))),
            audit: Arc::new(AuditLogger::new(
                cfg.audit_log_path.clone(),
                cfg.audit_log_json,
            )),
            cfg,
        }
    }
}

/// Run the long-polling dispatcher until Ctrl-C.
///
/// teloxide processes updates of one chat sequentially and different chats
/// concurrently.
pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    tracing::info!("qrbot started: @{}", me.username());
    if cfg.telegram_allowed_users.is_empty() {
        tracing::info!("Access: public");
    } else {
        tracing::info!("Allowed users: {}", cfg.telegram_allowed_users.len());
    }
    tracing::info!(
        "QR rendering: {} px/module, border {}, ec {:?}",
        cfg.qr.module_size,
        cfg.qr.border,
        cfg.qr.error_correction
    );

    // Keep a 429 RetryAfter retry at the Telegram adapter layer as well.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState::new(cfg, messenger));

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::info!("qrbot stopped");
    Ok(())
}
