//! Image encoding: `GrayImage` → PNG bytes → base64 text.
//!
//! Ollama's `/api/generate` takes images as bare base64 strings (no
//! `data:` prefix) in the `images` array. PNG is used because it is lossless:
//! a binarized page is exactly the kind of content JPEG smears, and it
//! compresses a two-level image very well anyway.

use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{GrayImage, ImageFormat};
use std::io::Cursor;
use tracing::debug;

/// A processed image in both of the forms the rest of the pipeline needs.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    /// PNG file bytes; kept for display.
    pub png: Vec<u8>,
    /// Standard-alphabet base64 of `png`; sent to the model.
    pub base64: String,
}

/// Encode the processed image as PNG, then base64.
pub fn encode_image(img: &GrayImage) -> Result<EncodedImage, OcrError> {
    let png = encode_png(img)?;
    let base64 = to_base64(&png);
    debug!(
        "Encoded {}x{} image → {} bytes PNG, {} bytes base64",
        img.width(),
        img.height(),
        png.len(),
        base64.len()
    );
    Ok(EncodedImage { png, base64 })
}

/// Serialize a grayscale image to PNG bytes.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, OcrError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| OcrError::EncodeFailed {
            detail: e.to_string(),
        })?;
    Ok(buf)
}

pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn from_base64(text: &str) -> Result<Vec<u8>, OcrError> {
    STANDARD.decode(text).map_err(|e| OcrError::DecodeFailed {
        detail: format!("invalid base64: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn encode_small_image() {
        let img = GrayImage::from_fn(10, 6, |x, _| Luma([if x % 2 == 0 { 0 } else { 255 }]));
        let data = encode_image(&img).expect("encode should succeed");
        assert_eq!(&data.png[..4], b"\x89PNG");
        assert!(!data.base64.is_empty());
        assert!(!data.base64.starts_with("data:"));
    }

    #[test]
    fn base64_reproduces_png_bytes() {
        let img = GrayImage::from_fn(33, 17, |x, y| Luma([((x * 7 + y * 3) % 2 * 255) as u8]));
        let data = encode_image(&img).unwrap();
        let decoded = from_base64(&data.base64).unwrap();
        assert_eq!(decoded, data.png);

        let reloaded = image::load_from_memory(&decoded).unwrap().to_luma8();
        assert_eq!(reloaded, img);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(from_base64("not*base64!").is_err());
    }
}
