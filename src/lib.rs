//! # ocr-extractor
//!
//! Extract the text of a photographed or scanned image with a local Vision
//! Language Model served by [Ollama](https://ollama.com).
//!
//! ## Pipeline Overview
//!
//! ```text
//! image upload (jpg / jpeg / png)
//!  │
//!  ├─ 1. Input       extension check, decode to RGB
//!  ├─ 2. Preprocess  longest edge ≤ 1200 px (area average), adaptive Gaussian threshold
//!  ├─ 3. Encode      PNG → base64
//!  ├─ 4. Inference   POST /api/generate, read NDJSON, concatenate `response` fragments
//!  └─ 5. Present     processed image | extracted text, plus elapsed time
//! ```
//!
//! Every run is independent: one upload in, one text out, no state carried
//! between runs.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr_extractor::{extract, present, ExtractorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // qwen2.5vl:3b on http://localhost:11434 unless configured otherwise
//!     let config = ExtractorConfig::default();
//!     let output = extract("receipt.jpg", &config).await?;
//!     println!("{}", output.text);
//!     eprintln!("{}", present::format_secs(output.stats.total_secs()));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `ocrx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | on      | Enables [`server`], the upload-form web front-end (axum) |
//!
//! Disable both when using only the library:
//! ```toml
//! ocr-extractor = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod present;
pub mod progress;
pub mod prompts;
#[cfg(feature = "server")]
pub mod server;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractorConfig, ExtractorConfigBuilder, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use error::OcrError;
pub use extract::{extract, extract_from_bytes, extract_sync, extract_to_file};
pub use output::{ExtractionOutput, ExtractionStats};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback, Stage};
pub use stream::{extract_stream, FragmentStream};
