//! Input resolution: validate an upload and decode it into an RGB raster.
//!
//! Uploads arrive either as a path (CLI) or as a named byte buffer (web
//! form). Both go through the same extension check and the same decoder so
//! the two front-ends reject exactly the same files. Images are always
//! converted to 3-channel RGB: alpha carries nothing the thresholding step
//! can use, and a fixed channel count keeps the preprocessing code simple.

use crate::error::OcrError;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions accepted by both front-ends.
pub const ACCEPTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Reject file names whose extension is not in [`ACCEPTED_EXTENSIONS`].
pub fn check_extension(name: &str) -> Result<(), OcrError> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext {
        Some(ext) if ACCEPTED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(OcrError::UnsupportedExtension {
            name: name.to_string(),
        }),
    }
}

/// Read an image file from disk, validating its extension first.
pub async fn read_file(path: &Path) -> Result<Vec<u8>, OcrError> {
    check_extension(&path.to_string_lossy())?;

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            debug!("Read {} bytes from {}", bytes.len(), path.display());
            Ok(bytes)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(OcrError::FileNotFound {
            path: PathBuf::from(path),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(OcrError::PermissionDenied {
                path: PathBuf::from(path),
            })
        }
        Err(e) => Err(OcrError::Internal(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Decode raw upload bytes into an RGB image.
///
/// The format is sniffed from the magic bytes, not trusted from the file
/// name, so a PNG saved as `.jpg` still decodes. An EXIF orientation tag is
/// applied, so a portrait phone photo comes out upright.
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, OcrError> {
    if bytes.is_empty() {
        return Err(OcrError::EmptyUpload);
    }

    let decode_failed = |detail: String| OcrError::DecodeFailed { detail };

    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| decode_failed(e.to_string()))?
        .into_decoder()
        .map_err(|e| decode_failed(e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_failed(e.to_string()))?;
    img.apply_orientation(orientation);

    debug!(
        "Decoded {:?} image {}x{} ({} bytes, orientation {:?})",
        img.color(),
        img.width(),
        img.height(),
        bytes.len(),
        orientation
    );

    Ok(img.to_rgb8())
}
