//! Pipeline stages for image-to-text extraction.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and swapped without touching its neighbours.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ preprocess ──▶ encode ──▶ client
//! (bytes)    (resize +     (PNG +     (Ollama NDJSON
//!             threshold)    base64)    stream)
//! ```
//!
//! 1. [`input`]      — extension check, file read, decode to RGB
//! 2. [`preprocess`] — area-average resize, grayscale, adaptive Gaussian
//!    threshold; CPU-bound, run inside `spawn_blocking`
//! 3. [`encode`]     — PNG-encode and base64-wrap the binarized image
//! 4. [`client`]     — the single POST and the line-by-line stream decoding;
//!    the only stage with network I/O

pub mod client;
pub mod encode;
pub mod input;
pub mod preprocess;
