use image::{codecs::png::PngEncoder, ColorType, GrayImage, ImageEncoder, Luma};
use qrcode::{
    types::{Color, QrError},
    QrCode,
};

use super::{EncodingError, ErrorCorrection, QrMatrix, QrOptions, RasterImage};

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

/// Largest rendered side length; Telegram rejects photos above 10000 px
/// of combined width and height.
pub const MAX_IMAGE_SIDE: u32 = 4096;

/// Encode `text` into a PNG QR symbol.
///
/// The smallest version that fits the payload at the configured
/// error-correction level is selected.
pub fn encode(text: &str, opts: &QrOptions) -> Result<RasterImage, EncodingError> {
    let matrix = encode_matrix(text, opts.error_correction)?;
    render(&matrix, opts)
}

/// Build the module grid for `text` without rasterizing it.
pub fn encode_matrix(text: &str, ec: ErrorCorrection) -> Result<QrMatrix, EncodingError> {
    if text.is_empty() {
        return Err(EncodingError::EmptyPayload);
    }

    let code =
        QrCode::with_error_correction_level(text.as_bytes(), ec.into()).map_err(|e| match e {
            QrError::DataTooLong => EncodingError::DataTooLong { len: text.len() },
            other => EncodingError::Symbol(other.to_string()),
        })?;

    let modules = code
        .to_colors()
        .into_iter()
        .map(|c| c == Color::Dark)
        .collect();

    Ok(QrMatrix::new(code.width(), modules))
}

/// Rasterize a module grid as black-on-white PNG with a quiet border.
pub fn render(matrix: &QrMatrix, opts: &QrOptions) -> Result<RasterImage, EncodingError> {
    let scale = opts.module_size.max(1);
    let border = opts.border;
    let side_modules = matrix.width() as u64 + 2 * u64::from(border);
    let side_px = side_modules.saturating_mul(u64::from(scale));
    let side = u32::try_from(side_px)
        .ok()
        .filter(|side| *side <= MAX_IMAGE_SIDE)
        .ok_or(EncodingError::TooLarge {
            side: side_px,
            max: MAX_IMAGE_SIDE,
        })?;

    let img = GrayImage::from_fn(side, side, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        if mx < border || my < border {
            return LIGHT;
        }
        if matrix.is_dark((mx - border) as usize, (my - border) as usize) {
            DARK
        } else {
            LIGHT
        }
    });

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(img.as_raw(), side, side, ColorType::L8)
        .map_err(EncodingError::Render)?;

    Ok(RasterImage {
        png,
        width: side,
        height: side,
        modules: matrix.width(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

    #[test]
    fn rejects_empty_payload() {
        let err = encode("", &QrOptions::default()).unwrap_err();
        assert!(matches!(err, EncodingError::EmptyPayload));
    }

    #[test]
    fn rejects_payload_over_capacity() {
        // Version 40-M holds 2331 bytes in byte mode.
        let text = "x".repeat(3000);
        let err = encode(&text, &QrOptions::default()).unwrap_err();
        assert!(matches!(err, EncodingError::DataTooLong { len: 3000 }));
    }

    #[test]
    fn lower_error_correction_fits_more() {
        let text = "x".repeat(2900);
        assert!(encode_matrix(&text, ErrorCorrection::Medium).is_err());
        let m = encode_matrix(&text, ErrorCorrection::Low).unwrap();
        assert_eq!(m.width(), 177);
    }

    #[test]
    fn short_url_uses_small_version() {
        let m = encode_matrix("https://example.com", ErrorCorrection::Medium).unwrap();
        // Version 2 (25 modules) is the smallest that fits 19 bytes at M.
        assert_eq!(m.width(), 25);
        // Finder pattern corners are dark.
        assert!(m.is_dark(0, 0));
        assert!(m.is_dark(m.width() - 1, 0));
        assert!(m.is_dark(0, m.width() - 1));
    }

    #[test]
    fn same_payload_gives_same_grid() {
        let a = encode_matrix("hello world", ErrorCorrection::Medium).unwrap();
        let b = encode_matrix("hello world", ErrorCorrection::Medium).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn renders_png_with_border_and_scale() {
        let opts = QrOptions::default();
        let img = encode("hello", &opts).unwrap();
        assert!(img.png.starts_with(PNG_SIGNATURE));
        assert_eq!(img.modules, 21);
        assert_eq!(img.width, (21 + 8) * 10);
        assert_eq!(img.width, img.height);

        let pixels = image::load_from_memory(&img.png).unwrap().to_luma8();
        assert_eq!(pixels.dimensions(), (290, 290));
        // Quiet border is white, top-left finder module starts right after it.
        assert_eq!(pixels.get_pixel(0, 0).0[0], 255);
        assert_eq!(pixels.get_pixel(39, 39).0[0], 255);
        assert_eq!(pixels.get_pixel(40, 40).0[0], 0);
    }

    #[test]
    fn huge_module_size_is_an_error_not_a_panic() {
        let opts = QrOptions {
            module_size: u32::MAX / 4,
            ..QrOptions::default()
        };
        let err = encode("x", &opts).unwrap_err();
        assert!(matches!(err, EncodingError::TooLarge { max: MAX_IMAGE_SIDE, .. }));

        let opts = QrOptions {
            border: u32::MAX,
            ..QrOptions::default()
        };
        assert!(matches!(
            encode("x", &opts),
            Err(EncodingError::TooLarge { .. })
        ));
    }

    #[test]
    fn large_versions_respect_side_limit() {
        let matrix = encode_matrix(&"x".repeat(2000), ErrorCorrection::Medium).unwrap();
        let opts = QrOptions {
            module_size: 64,
            ..QrOptions::default()
        };
        assert!(matches!(
            render(&matrix, &opts),
            Err(EncodingError::TooLarge { .. })
        ));

        let img = render(&matrix, &QrOptions::default()).unwrap();
        assert!(img.width <= MAX_IMAGE_SIDE);
    }

    #[test]
    fn zero_module_size_is_clamped() {
        let opts = QrOptions {
            module_size: 0,
            border: 0,
            ..QrOptions::default()
        };
        let img = encode("hello", &opts).unwrap();
        assert_eq!(img.width, 21);
    }
}
