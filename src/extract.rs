//! Eager extraction entry points.
//!
//! These wait for the model to finish and return the complete text together
//! with the processed image and timing stats. Use
//! [`crate::stream::extract_stream`] instead to render text while it is
//! still arriving.

use crate::config::ExtractorConfig;
use crate::error::OcrError;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::client::OllamaClient;
use crate::pipeline::encode::{self, EncodedImage};
use crate::pipeline::{input, preprocess};
use crate::progress::Stage;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// An upload after decode, preprocessing and encoding, ready to send.
#[derive(Debug, Clone)]
pub(crate) struct PreparedImage {
    pub original_width: u32,
    pub original_height: u32,
    pub processed_width: u32,
    pub processed_height: u32,
    pub upload_bytes: usize,
    pub encoded: EncodedImage,
}

/// Decode, resize, binarize and encode `bytes` on the blocking pool.
pub(crate) async fn prepare(
    bytes: Vec<u8>,
    config: &ExtractorConfig,
) -> Result<PreparedImage, OcrError> {
    let cfg = config.clone();

    tokio::task::spawn_blocking(move || {
        let progress = cfg.progress_callback.as_deref();

        if let Some(cb) = progress {
            cb.on_stage(Stage::Decoding);
        }
        let rgb = input::decode_image(&bytes)?;
        let (original_width, original_height) = rgb.dimensions();

        if let Some(cb) = progress {
            cb.on_stage(Stage::Preprocessing);
        }
        let processed = preprocess::preprocess(rgb, &cfg);
        let (processed_width, processed_height) = processed.dimensions();

        if let Some(cb) = progress {
            cb.on_stage(Stage::Encoding);
        }
        let encoded = encode::encode_image(&processed)?;

        Ok(PreparedImage {
            original_width,
            original_height,
            processed_width,
            processed_height,
            upload_bytes: bytes.len(),
            encoded,
        })
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Preprocessing task panicked: {}", e)))?
}

/// Extract text from an image file.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(OcrError)` when the file cannot be read or decoded, the
/// model server cannot be reached, or the response stream is malformed.
pub async fn extract(
    path: impl AsRef<Path>,
    config: &ExtractorConfig,
) -> Result<ExtractionOutput, OcrError> {
    let path = path.as_ref();
    info!("Starting extraction: {}", path.display());
    let bytes = input::read_file(path).await?;
    extract_from_bytes(&bytes, config).await
}

/// Extract text from an in-memory upload.
///
/// The caller is responsible for any extension check; the bytes themselves
/// are sniffed to find the format.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractorConfig,
) -> Result<ExtractionOutput, OcrError> {
    let total_start = Instant::now();
    let progress = config.progress_callback.as_deref();

    let prepared = prepare(bytes.to_vec(), config).await?;
    let preprocess_duration_ms = total_start.elapsed().as_millis() as u64;
    debug!(
        "Prepared {}x{} → {}x{} in {}ms",
        prepared.original_width,
        prepared.original_height,
        prepared.processed_width,
        prepared.processed_height,
        preprocess_duration_ms
    );

    if let Some(cb) = progress {
        cb.on_stage(Stage::Inference);
    }
    let llm_start = Instant::now();
    let client = OllamaClient::from_config(config)?;
    let generation = client.generate(&prepared.encoded.base64, progress).await?;
    let inference_duration_ms = llm_start.elapsed().as_millis() as u64;

    let elapsed = total_start.elapsed();
    if let Some(cb) = progress {
        cb.on_complete(elapsed, generation.text.len());
    }

    let stats = ExtractionStats {
        model: config.model.clone(),
        original_width: prepared.original_width,
        original_height: prepared.original_height,
        processed_width: prepared.processed_width,
        processed_height: prepared.processed_height,
        upload_bytes: prepared.upload_bytes,
        png_bytes: prepared.encoded.png.len(),
        base64_bytes: prepared.encoded.base64.len(),
        fragments: generation.fragments,
        done: generation.done,
        done_reason: generation.done_reason,
        prompt_tokens: generation.prompt_eval_count,
        output_tokens: generation.eval_count,
        preprocess_duration_ms,
        inference_duration_ms,
        total_duration_ms: elapsed.as_millis() as u64,
    };

    info!(
        "Extraction complete: {} chars, {}ms total",
        generation.text.len(),
        stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        text: generation.text,
        image_png: prepared.encoded.png,
        stats,
    })
}

/// Extract text and write it directly to a file.
///
/// Uses an atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ExtractorConfig,
) -> Result<ExtractionStats, OcrError> {
    let output = extract(input_path, config).await?;
    write_atomic(output_path.as_ref(), output.text.into_bytes()).await?;
    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path: impl AsRef<Path>,
    config: &ExtractorConfig,
) -> Result<ExtractionOutput, OcrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| OcrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(path, config))
}

/// Write `contents` to `path` via a sibling temp file and a rename.
pub async fn write_atomic(path: &Path, contents: Vec<u8>) -> Result<(), OcrError> {
    let target = path.to_path_buf();

    tokio::task::spawn_blocking(move || {
        let fail = |source: std::io::Error| OcrError::OutputWriteFailed {
            path: target.clone(),
            source,
        };

        let parent = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(fail)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(fail)?;
        tmp.write_all(&contents).map_err(fail)?;
        tmp.persist(&target).map_err(|e| fail(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| OcrError::Internal(format!("Write task panicked: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn jpeg_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(w, h, |x, y| {
            if (x / 8 + y / 8) % 2 == 0 {
                Rgb([240, 240, 240])
            } else {
                Rgb([20, 20, 20])
            }
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn prepare_reports_dimensions() {
        let config = ExtractorConfig::builder().max_dimension(100).build().unwrap();
        let prepared = prepare(jpeg_bytes(300, 150), &config).await.unwrap();
        assert_eq!(
            (prepared.original_width, prepared.original_height),
            (300, 150)
        );
        assert_eq!(
            (prepared.processed_width, prepared.processed_height),
            (100, 50)
        );
        assert_eq!(&prepared.encoded.png[..4], b"\x89PNG");
    }

    #[tokio::test]
    async fn prepare_rejects_garbage() {
        let config = ExtractorConfig::default();
        let err = prepare(b"GIF89a....".to_vec(), &config).await.unwrap_err();
        assert!(err.is_upload_error());
    }

    #[tokio::test]
    async fn write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/out.txt");
        write_atomic(&target, b"Hello World".to_vec()).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "Hello World");
    }
}
