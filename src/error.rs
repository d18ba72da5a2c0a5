//! Error types for the ocr-extractor library.
//!
//! Every public entry point returns `Result<_, OcrError>`. An extraction is a
//! single upload going through a single pipeline run, so there is no partial
//! success to report: either the text came back or one of the variants below
//! explains where the run stopped.
//!
//! Variants are grouped by pipeline stage. [`OcrError::is_upload_error`]
//! splits them into "the image is the problem" and "the model server is the
//! problem", which is the distinction front-ends care about when picking a
//! status code or an error message.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr-extractor library.
#[derive(Debug, Error)]
pub enum OcrError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// File name does not end in one of the accepted image extensions.
    #[error("Unsupported file type '{name}': expected one of jpg, jpeg, png")]
    UnsupportedExtension { name: String },

    /// The upload contained no bytes.
    #[error("Uploaded image is empty")]
    EmptyUpload,

    /// The bytes could not be decoded as an image.
    #[error("Failed to decode image: {detail}")]
    DecodeFailed { detail: String },

    /// The processed image could not be written as PNG.
    #[error("Failed to encode processed image as PNG: {detail}")]
    EncodeFailed { detail: String },

    // ── Inference errors ──────────────────────────────────────────────────
    /// TCP connection to the model server could not be established.
    #[error("Could not reach model server at '{endpoint}': {detail}\nIs `ollama serve` running?")]
    EndpointUnreachable { endpoint: String, detail: String },

    /// The configured request timeout elapsed before the stream finished.
    #[error("Request to '{endpoint}' timed out after {secs}s")]
    RequestTimeout { endpoint: String, secs: u64 },

    /// Model server answered with a non-success HTTP status.
    #[error("Model server returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// The response body broke off mid-stream.
    #[error("Response stream failed: {detail}")]
    StreamFailed { detail: String },

    /// A streamed line was not valid JSON. The whole extraction is aborted.
    #[error("Malformed JSON on stream line {line_no}: {source}\nLine: {line:?}")]
    MalformedStreamLine {
        line_no: usize,
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// The model server reported an error inside the stream (e.g. unknown model).
    #[error("Model '{model}' reported an error: {message}")]
    ModelError { model: String, message: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// `true` when the error was caused by the uploaded image rather than by
    /// the model server or the local environment.
    pub fn is_upload_error(&self) -> bool {
        matches!(
            self,
            OcrError::FileNotFound { .. }
                | OcrError::PermissionDenied { .. }
                | OcrError::UnsupportedExtension { .. }
                | OcrError::EmptyUpload
                | OcrError::DecodeFailed { .. }
        )
    }

    /// `true` when the model server (or the path to it) failed.
    pub fn is_inference_error(&self) -> bool {
        matches!(
            self,
            OcrError::EndpointUnreachable { .. }
                | OcrError::RequestTimeout { .. }
                | OcrError::HttpStatus { .. }
                | OcrError::StreamFailed { .. }
                | OcrError::MalformedStreamLine { .. }
                | OcrError::ModelError { .. }
        )
    }
}
