use std::sync::Arc;

use qrbot_core::config::Config;

#[tokio::main]
async fn main() -> Result<(), qrbot_core::Error> {
    qrbot_core::logging::init("qrbot")?;

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!("{e}");
            return Err(e);
        }
    };

    qrbot_telegram::router::run_polling(cfg)
        .await
        .map_err(|e| qrbot_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
