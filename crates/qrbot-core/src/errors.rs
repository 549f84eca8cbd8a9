use crate::qr::{EncodingError, ImageParseError};

/// Core error type for the QR bot.
///
/// Adapter crates map their specific errors into this type so failures are
/// reported consistently (user-facing reply vs startup-fatal).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    ImageParse(#[from] ImageParseError),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
