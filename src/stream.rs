//! Streaming extraction API: emit text fragments as they arrive.
//!
//! Small models on a CPU can take tens of seconds to finish a page. The
//! stream returned by [`extract_stream`] yields each `response` fragment as
//! soon as its line is parsed, so a front-end can show text growing in place
//! instead of a spinner. Concatenating every `Ok` item gives exactly the text
//! the eager [`crate::extract::extract_from_bytes`] would have returned.

use crate::config::ExtractorConfig;
use crate::error::OcrError;
use crate::extract::prepare;
use crate::pipeline::client::OllamaClient;
use crate::progress::Stage;
use futures::stream::StreamExt;
use std::pin::Pin;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, OcrError>> + Send>>;

/// Preprocess `bytes`, send them to the model, and stream the reply.
///
/// # Returns
/// - `Ok(FragmentStream)` — fragments in arrival order; ends after the body
///   ends or after the first `Err` item
/// - `Err(OcrError)` — the image was unusable or the request was rejected
///   before any text arrived
///
/// # Example
/// ```rust,no_run
/// use ocr_extractor::{extract_stream, ExtractorConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("receipt.jpg")?;
/// let mut fragments = extract_stream(&bytes, &ExtractorConfig::default()).await?;
/// while let Some(fragment) = fragments.next().await {
///     print!("{}", fragment?);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn extract_stream(
    bytes: &[u8],
    config: &ExtractorConfig,
) -> Result<FragmentStream, OcrError> {
    info!("Starting streaming extraction ({} bytes)", bytes.len());

    let prepared = prepare(bytes.to_vec(), config).await?;

    if let Some(cb) = config.progress_callback.as_deref() {
        cb.on_stage(Stage::Inference);
    }
    let client = OllamaClient::from_config(config)?;
    let chunks = client.submit(&prepared.encoded.base64).await?;

    let model = config.model.clone();
    let fragments = chunks.filter_map(move |chunk| {
        let item = match chunk {
            Err(e) => Some(Err(e)),
            Ok(c) => match c.error {
                Some(message) => Some(Err(OcrError::ModelError {
                    model: model.clone(),
                    message,
                })),
                None => c.response.map(Ok),
            },
        };
        futures::future::ready(item)
    });

    // A model error line ends the stream just like a transport error.
    let mut failed = false;
    let bounded = fragments.take_while(move |item| {
        let keep = !failed;
        failed |= item.is_err();
        futures::future::ready(keep)
    });

    Ok(Box::pin(bounded))
}
