//! Configuration types for image-to-text extraction.
//!
//! Every knob of the pipeline lives in [`ExtractorConfig`], built via
//! [`ExtractorConfigBuilder`]. Defaults: a 1200 px longest edge, a 17 px
//! Gaussian threshold window with offset 7, and `qwen2.5vl:3b` served by a
//! local Ollama.

use crate::error::OcrError;
use crate::progress::ProgressCallback;
use crate::prompts::DEFAULT_PROMPT;
use std::fmt;

/// Default Ollama generate endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";

/// Default vision model tag.
pub const DEFAULT_MODEL: &str = "qwen2.5vl:3b";

/// Configuration for a single extraction.
///
/// Built via [`ExtractorConfig::builder()`] or using
/// [`ExtractorConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr_extractor::ExtractorConfig;
///
/// let config = ExtractorConfig::builder()
///     .model("llava:7b")
///     .max_dimension(1600)
///     .build()
///     .unwrap();
/// assert_eq!(config.block_size, 17);
/// ```
#[derive(Clone)]
pub struct ExtractorConfig {
    /// Full URL of the generate endpoint. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model tag sent in the request body. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Instruction sent alongside the image. Default: [`DEFAULT_PROMPT`].
    pub prompt: String,

    /// Longest edge, in pixels, after resizing. Default: 1200.
    ///
    /// Images whose longer side is already within the bound are left alone;
    /// nothing is ever upscaled.
    pub max_dimension: u32,

    /// Side of the square neighbourhood used for the local threshold. Must be
    /// odd and at least 3. Default: 17.
    pub block_size: u32,

    /// Constant subtracted from the Gaussian-weighted local mean. Default: 7.
    ///
    /// Larger values push more pixels to white, which removes faint noise at
    /// the cost of thin strokes.
    pub threshold_c: i32,

    /// Overall request timeout in seconds, including the whole stream.
    /// Default: `None` (wait for the model as long as it takes).
    pub request_timeout_secs: Option<u64>,

    /// TCP connect timeout in seconds. Default: 10.
    pub connect_timeout_secs: u64,

    /// Optional callback receiving stage and fragment events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            prompt: DEFAULT_PROMPT.to_string(),
            max_dimension: 1200,
            block_size: 17,
            threshold_c: 7,
            request_timeout_secs: None,
            connect_timeout_secs: 10,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractorConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("prompt", &self.prompt)
            .field("max_dimension", &self.max_dimension)
            .field("block_size", &self.block_size)
            .field("threshold_c", &self.threshold_c)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractorConfig {
    /// Create a new builder for `ExtractorConfig`.
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug)]
pub struct ExtractorConfigBuilder {
    config: ExtractorConfig,
}

impl ExtractorConfigBuilder {
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    /// Point at an Ollama host (`http://host:port`), appending `/api/generate`.
    pub fn ollama_host(mut self, host: impl AsRef<str>) -> Self {
        self.config.endpoint = endpoint_from_host(host.as_ref());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = prompt.into();
        self
    }

    pub fn max_dimension(mut self, px: u32) -> Self {
        self.config.max_dimension = px.max(1);
        self
    }

    pub fn block_size(mut self, size: u32) -> Self {
        self.config.block_size = size;
        self
    }

    pub fn threshold_c(mut self, c: i32) -> Self {
        self.config.threshold_c = c.clamp(-255, 255);
        self
    }

    pub fn request_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.config.request_timeout_secs = secs.filter(|s| *s > 0);
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs.max(1);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractorConfig, OcrError> {
        let c = &self.config;
        if c.block_size < 3 || c.block_size % 2 == 0 {
            return Err(OcrError::InvalidConfig(format!(
                "block size must be odd and ≥ 3, got {}",
                c.block_size
            )));
        }
        if !(c.endpoint.starts_with("http://") || c.endpoint.starts_with("https://")) {
            return Err(OcrError::InvalidConfig(format!(
                "endpoint must be an http(s) URL, got '{}'",
                c.endpoint
            )));
        }
        if c.model.trim().is_empty() {
            return Err(OcrError::InvalidConfig("model must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Turn an `OLLAMA_HOST`-style value into a generate endpoint URL.
///
/// Accepts `host`, `host:port` or a full `http(s)://host[:port]` base. The
/// Ollama port 11434 is only assumed for a bare host; with a scheme, a
/// missing port means the scheme's own default (80 / 443).
pub fn endpoint_from_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        return format!("{host}/api/generate");
    }
    let has_port = host
        .rsplit_once(':')
        .map(|(_, tail)| !tail.is_empty() && tail.chars().all(|ch| ch.is_ascii_digit()))
        .unwrap_or(false);
    if has_port {
        format!("http://{host}/api/generate")
    } else {
        format!("http://{host}:11434/api/generate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_local_ollama() {
        let c = ExtractorConfig::default();
        assert_eq!(c.endpoint, "http://localhost:11434/api/generate");
        assert_eq!(c.model, "qwen2.5vl:3b");
        assert_eq!(c.max_dimension, 1200);
        assert_eq!(c.block_size, 17);
        assert_eq!(c.threshold_c, 7);
        assert!(c.request_timeout_secs.is_none());
    }

    #[test]
    fn even_block_size_is_rejected() {
        let err = ExtractorConfig::builder().block_size(16).build().unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn tiny_block_size_is_rejected() {
        assert!(ExtractorConfig::builder().block_size(1).build().is_err());
        assert!(ExtractorConfig::builder().block_size(3).build().is_ok());
    }

    #[test]
    fn non_http_endpoint_is_rejected() {
        let err = ExtractorConfig::builder()
            .endpoint("localhost:11434")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn zero_timeout_means_none() {
        let c = ExtractorConfig::builder()
            .request_timeout_secs(Some(0))
            .build()
            .unwrap();
        assert_eq!(c.request_timeout_secs, None);
    }

    #[test]
    fn endpoint_from_host_variants() {
        assert_eq!(
            endpoint_from_host("127.0.0.1"),
            "http://127.0.0.1:11434/api/generate"
        );
        assert_eq!(
            endpoint_from_host("gpu-box:8080"),
            "http://gpu-box:8080/api/generate"
        );
        assert_eq!(
            endpoint_from_host("https://ollama.internal/"),
            "https://ollama.internal/api/generate"
        );
        assert_eq!(
            endpoint_from_host("http://ollama.lan"),
            "http://ollama.lan/api/generate"
        );
        assert_eq!(
            endpoint_from_host("http://localhost:11434"),
            "http://localhost:11434/api/generate"
        );
    }
}
