//! Result types returned by the extraction entry points.

use serde::{Deserialize, Serialize};

/// The finished result of one extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Text returned by the model: every streamed fragment, in order.
    pub text: String,

    /// The processed (resized, binarized) image as PNG, exactly as sent.
    ///
    /// Skipped in JSON output; it is already available as a file or data URI
    /// wherever it is displayed.
    #[serde(skip)]
    pub image_png: Vec<u8>,

    /// Sizes, counts and timings.
    pub stats: ExtractionStats,
}

/// Measurements taken during one extraction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Model tag the request was sent to.
    pub model: String,
    /// Dimensions of the decoded upload.
    pub original_width: u32,
    pub original_height: u32,
    /// Dimensions after resizing.
    pub processed_width: u32,
    pub processed_height: u32,
    /// Size of the upload in bytes.
    pub upload_bytes: usize,
    /// Size of the processed PNG in bytes.
    pub png_bytes: usize,
    /// Size of the base64 payload in bytes.
    pub base64_bytes: usize,
    /// Number of streamed lines that carried a text fragment.
    pub fragments: usize,
    /// Whether the server sent its `done` line.
    pub done: bool,
    pub done_reason: Option<String>,
    /// Token counts reported by the server, when present.
    pub prompt_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    /// Decode + resize + threshold + encode.
    pub preprocess_duration_ms: u64,
    /// From request start to end of stream.
    pub inference_duration_ms: u64,
    /// Wall-clock time of the whole run.
    pub total_duration_ms: u64,
}

impl ExtractionStats {
    /// Total wall-clock time in seconds.
    pub fn total_secs(&self) -> f64 {
        self.total_duration_ms as f64 / 1000.0
    }
}
