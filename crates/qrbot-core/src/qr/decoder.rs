use image::{imageops::FilterType, DynamicImage, GenericImageView, GrayImage};

use super::{DecodeResult, ImageParseError};

/// Longest side, in pixels, an image is scaled down to before detection.
pub const DEFAULT_MAX_DECODE_DIM: u32 = 2048;

/// Decode the first readable QR symbol in an encoded image (JPEG, PNG, ...).
///
/// A buffer that is not an image yields `ImageParseError`; a valid image
/// without a readable symbol yields `DecodeResult::NotFound`.
pub fn decode(image_bytes: &[u8]) -> Result<DecodeResult, ImageParseError> {
    decode_scaled(image_bytes, DEFAULT_MAX_DECODE_DIM)
}

/// Like [`decode`], scaling images whose longest side exceeds `max_dim`
/// down before detection. `0` disables scaling.
pub fn decode_scaled(image_bytes: &[u8], max_dim: u32) -> Result<DecodeResult, ImageParseError> {
    let img = image::load_from_memory(image_bytes)?;
    Ok(detect(&to_detect_luma(&img, max_dim)))
}

fn to_detect_luma(img: &DynamicImage, max_dim: u32) -> GrayImage {
    let (w, h) = img.dimensions();
    if max_dim == 0 || w.max(h) <= max_dim {
        return img.to_luma8();
    }
    img.resize(max_dim, max_dim, FilterType::Triangle).to_luma8()
}

/// Run one detection pass over a luminance image.
///
/// Grids are tried in detection order and the first one that decodes wins,
/// so identical input always yields the same payload.
pub fn detect(luma: &GrayImage) -> DecodeResult {
    let (w, h) = luma.dimensions();
    if w == 0 || h == 0 {
        return DecodeResult::NotFound;
    }

    let mut prepared =
        rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
            luma.get_pixel(x as u32, y as u32).0[0]
        });

    prepared
        .detect_grids()
        .into_iter()
        .find_map(|grid| {
            let mut payload = Vec::new();
            grid.decode_to(&mut payload).ok()?;
            Some(payload_to_text(payload))
        })
        .map(DecodeResult::DecodedText)
        .unwrap_or(DecodeResult::NotFound)
}

/// UTF-8 when valid, otherwise ISO-8859-1 (the byte-mode default charset).
fn payload_to_text(payload: Vec<u8>) -> String {
    match String::from_utf8(payload) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}
