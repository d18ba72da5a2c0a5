//! Remote inference: POST the image to Ollama and read the NDJSON stream.
//!
//! `/api/generate` with `"stream": true` answers with one JSON object per
//! line. Most lines carry a `response` fragment; the last one carries
//! `"done": true` plus timing and token statistics; a failing model may send
//! a line with an `error` field instead. The body arrives in arbitrary
//! chunks, so lines are re-assembled in [`LineBuffer`] before parsing.
//!
//! ## Line handling
//!
//! * blank lines are skipped;
//! * a line that is not valid JSON aborts the whole extraction with
//!   [`OcrError::MalformedStreamLine`]; partial text is never returned as if
//!   it were complete;
//! * valid JSON that is not an object (`[..]`, `null`, a string) is skipped;
//! * a line without `response` contributes nothing, and reading carries on
//!   to the end of the body even after `done: true`;
//! * a line with `error` aborts with [`OcrError::ModelError`].
//!
//! There is no retry: the request is sent once, and any failure is returned
//! to the caller.

use crate::config::ExtractorConfig;
use crate::error::OcrError;
use crate::progress::ExtractionProgressCallback;
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Maximum number of characters of an error body kept for display.
const ERROR_BODY_LIMIT: usize = 500;

/// JSON body of a generate request.
#[derive(Debug, Serialize)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub images: Vec<&'a str>,
    pub stream: bool,
}

/// One NDJSON line of a generate response.
///
/// Unknown fields (`created_at`, `context`, …) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    /// Server-side wall time in nanoseconds.
    #[serde(default)]
    pub total_duration: Option<u64>,
}

/// Everything learned from one complete response stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generation {
    /// Concatenation of every `response` fragment, in arrival order.
    pub text: String,
    /// Number of lines that carried a `response` field.
    pub fragments: usize,
    /// Whether a `done: true` line was seen.
    pub done: bool,
    pub done_reason: Option<String>,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
    pub total_duration_ns: Option<u64>,
}

impl Generation {
    /// Fold one chunk into the accumulated state.
    ///
    /// Returns the fragment that was appended, if any.
    pub fn absorb(&mut self, chunk: StreamChunk) -> Option<String> {
        if chunk.done {
            self.done = true;
            self.done_reason = chunk.done_reason.or(self.done_reason.take());
            self.prompt_eval_count = chunk.prompt_eval_count.or(self.prompt_eval_count);
            self.eval_count = chunk.eval_count.or(self.eval_count);
            self.total_duration_ns = chunk.total_duration.or(self.total_duration_ns);
        }
        let fragment = chunk.response?;
        self.fragments += 1;
        self.text.push_str(&fragment);
        Some(fragment)
    }
}

/// Re-assembles newline-terminated lines from arbitrary byte chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every line it completed (without the `\n`).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(pos) = self.buf[start..].iter().position(|b| *b == b'\n') {
            lines.push(self.buf[start..start + pos].to_vec());
            start += pos + 1;
        }
        self.buf.drain(..start);
        lines
    }

    /// Take whatever is left after the final newline, if anything.
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

/// Parse one raw line.
///
/// `Ok(None)` means the line was blank or held a JSON value other than an
/// object; only objects can carry a `response` field.
pub fn parse_line(line: &[u8], line_no: usize) -> Result<Option<StreamChunk>, OcrError> {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let malformed = |source: serde_json::Error| OcrError::MalformedStreamLine {
        line_no,
        line: String::from_utf8_lossy(trimmed).into_owned(),
        source,
    };

    let value: serde_json::Value = serde_json::from_slice(trimmed).map_err(malformed)?;
    if !value.is_object() {
        debug!("Skipping non-object stream line {}", line_no);
        return Ok(None);
    }
    serde_json::from_value::<StreamChunk>(value)
        .map(Some)
        .map_err(malformed)
}

/// A boxed stream of parsed response lines.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, OcrError>> + Send>>;

struct DecoderState<S> {
    inner: S,
    lines: LineBuffer,
    pending: VecDeque<Vec<u8>>,
    line_no: usize,
    eof: bool,
    failed: bool,
}

/// Turn a stream of body chunks into a stream of parsed [`StreamChunk`]s.
///
/// The output ends after the first error.
pub fn decode_chunks<S, B>(body: S) -> ChunkStream
where
    S: Stream<Item = Result<B, OcrError>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    let state = DecoderState {
        inner: body,
        lines: LineBuffer::new(),
        pending: VecDeque::new(),
        line_no: 0,
        eof: false,
        failed: false,
    };

    let s = stream::unfold(state, |mut st| async move {
        loop {
            if st.failed {
                return None;
            }
            if let Some(line) = st.pending.pop_front() {
                st.line_no += 1;
                match parse_line(&line, st.line_no) {
                    Ok(None) => continue,
                    Ok(Some(chunk)) => return Some((Ok(chunk), st)),
                    Err(e) => {
                        st.failed = true;
                        return Some((Err(e), st));
                    }
                }
            }
            if st.eof {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    let completed = st.lines.push(bytes.as_ref());
                    st.pending.extend(completed);
                }
                Some(Err(e)) => {
                    st.failed = true;
                    return Some((Err(e), st));
                }
                None => {
                    st.eof = true;
                    if let Some(rest) = st.lines.finish() {
                        st.pending.push_back(rest);
                    }
                }
            }
        }
    });

    Box::pin(s)
}

/// Drain a chunk stream into a [`Generation`].
///
/// Fires `on_fragment` for every appended fragment. A chunk carrying `error`
/// aborts with [`OcrError::ModelError`].
pub async fn consume_stream(
    mut chunks: ChunkStream,
    model: &str,
    progress: Option<&dyn ExtractionProgressCallback>,
) -> Result<Generation, OcrError> {
    let mut generation = Generation::default();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if let Some(message) = chunk.error.clone() {
            warn!("Model '{}' reported an error: {}", model, message);
            return Err(OcrError::ModelError {
                model: model.to_string(),
                message,
            });
        }
        if chunk.response.is_none() && !chunk.done {
            debug!("Skipping stream line without a response fragment");
        }
        if let Some(fragment) = generation.absorb(chunk) {
            if let Some(cb) = progress {
                cb.on_fragment(&fragment, generation.text.len());
            }
        }
    }

    if !generation.done {
        debug!("Stream ended without a done line");
    }
    Ok(generation)
}

/// HTTP client for an Ollama-compatible generate endpoint.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    prompt: String,
    request_timeout_secs: Option<u64>,
}

impl OllamaClient {
    /// Build a client from the endpoint, model, prompt and timeouts in `config`.
    pub fn from_config(config: &ExtractorConfig) -> Result<Self, OcrError> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| OcrError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            prompt: config.prompt.clone(),
            request_timeout_secs: config.request_timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Build the request body for one base64 image.
    pub fn request_for<'a>(&'a self, image_b64: &'a str) -> GenerateRequest<'a> {
        GenerateRequest {
            model: &self.model,
            prompt: &self.prompt,
            images: vec![image_b64],
            stream: true,
        }
    }

    /// Send the image and return the parsed response stream.
    ///
    /// Fails before any body is read if the server is unreachable or answers
    /// with a non-success status.
    pub async fn submit(&self, image_b64: &str) -> Result<ChunkStream, OcrError> {
        info!(
            "POST {} (model {}, {} bytes image)",
            self.endpoint,
            self.model,
            image_b64.len()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.request_for(image_b64))
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OcrError::HttpStatus {
                status: status.as_u16(),
                body: error_message_from_body(&body),
            });
        }

        let this = self.clone();
        let body = response
            .bytes_stream()
            .map(move |r| r.map_err(|e| this.map_transport_error(e)));
        Ok(decode_chunks(Box::pin(body)))
    }

    /// Submit and drain the stream in one call.
    pub async fn generate(
        &self,
        image_b64: &str,
        progress: Option<&dyn ExtractionProgressCallback>,
    ) -> Result<Generation, OcrError> {
        let chunks = self.submit(image_b64).await?;
        let generation = consume_stream(chunks, &self.model, progress).await?;
        info!(
            "Model returned {} chars in {} fragments (done: {})",
            generation.text.len(),
            generation.fragments,
            generation.done
        );
        Ok(generation)
    }

    fn map_transport_error(&self, e: reqwest::Error) -> OcrError {
        if e.is_timeout() {
            OcrError::RequestTimeout {
                endpoint: self.endpoint.clone(),
                secs: self.request_timeout_secs.unwrap_or_default(),
            }
        } else if e.is_connect() || e.is_request() {
            OcrError::EndpointUnreachable {
                endpoint: self.endpoint.clone(),
                detail: e.to_string(),
            }
        } else {
            OcrError::StreamFailed {
                detail: e.to_string(),
            }
        }
    }
}

/// Pull the `error` message out of an Ollama JSON error body, falling back to
/// the (truncated) raw text.
fn error_message_from_body(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string());

    if message.chars().count() > ERROR_BODY_LIMIT {
        let mut cut: String = message.chars().take(ERROR_BODY_LIMIT).collect();
        cut.push('\u{2026}');
        cut
    } else {
        message
    }
}
