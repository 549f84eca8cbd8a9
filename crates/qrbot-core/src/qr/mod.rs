//! QR conversion core: text → PNG symbol, image bytes → decoded text.
//!
//! Both directions are pure, synchronous and share no state, so they can be
//! called from any thread. Async callers should run them on a blocking pool.

mod decoder;
mod encoder;

use std::str::FromStr;

pub use decoder::{decode, decode_scaled, detect, DEFAULT_MAX_DECODE_DIM};
pub use encoder::{encode, encode_matrix, render, MAX_IMAGE_SIDE};

/// Error-correction level of a generated symbol.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorCorrection {
    /// ~7% of codewords recoverable.
    Low,
    /// ~15% of codewords recoverable.
    #[default]
    Medium,
    /// ~25% of codewords recoverable.
    Quartile,
    /// ~30% of codewords recoverable.
    High,
}

impl FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" | "LOW" => Ok(Self::Low),
            "M" | "MEDIUM" => Ok(Self::Medium),
            "Q" | "QUARTILE" => Ok(Self::Quartile),
            "H" | "HIGH" => Ok(Self::High),
            other => Err(format!("unknown error correction level: {other}")),
        }
    }
}

impl From<ErrorCorrection> for qrcode::EcLevel {
    fn from(ec: ErrorCorrection) -> Self {
        match ec {
            ErrorCorrection::Low => qrcode::EcLevel::L,
            ErrorCorrection::Medium => qrcode::EcLevel::M,
            ErrorCorrection::Quartile => qrcode::EcLevel::Q,
            ErrorCorrection::High => qrcode::EcLevel::H,
        }
    }
}

/// Rendering options for generated symbols.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QrOptions {
    /// Side length of one module in pixels.
    pub module_size: u32,
    /// Quiet border around the grid, in modules.
    pub border: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            module_size: 10,
            border: 4,
            error_correction: ErrorCorrection::Medium,
        }
    }
}

/// Module grid of an encoded symbol, row-major, `true` = dark.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QrMatrix {
    width: usize,
    modules: Vec<bool>,
}

impl QrMatrix {
    pub(crate) fn new(width: usize, modules: Vec<bool>) -> Self {
        debug_assert_eq!(modules.len(), width * width);
        Self { width, modules }
    }

    /// Number of modules per side (21 for version 1, 177 for version 40).
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_dark(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }
}

/// PNG-encoded symbol held in memory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Symbol width in modules, excluding the quiet border.
    pub modules: usize,
}

impl RasterImage {
    pub fn into_bytes(self) -> Vec<u8> {
        self.png
    }
}

/// Outcome of a decode pass over a valid image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DecodeResult {
    DecodedText(String),
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum EncodingError {
    #[error("nothing to encode: payload is empty")]
    EmptyPayload,

    #[error("payload of {len} bytes does not fit in any QR version")]
    DataTooLong { len: usize },

    #[error("rendered image would be {side} px wide, above the {max} px limit")]
    TooLarge { side: u64, max: u32 },

    #[error("qr symbol error: {0}")]
    Symbol(String),

    #[error("failed to write png: {0}")]
    Render(#[source] image::ImageError),
}

/// The input bytes are not a raster image the decoder understands.
#[derive(Debug, thiserror::Error)]
#[error("image parse error: {0}")]
pub struct ImageParseError(#[from] image::ImageError);
