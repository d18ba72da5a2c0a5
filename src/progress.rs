//! Progress-callback trait for extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractorConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves through its stages and as text fragments
//! stream back from the model.
//!
//! # Example
//!
//! ```rust
//! use ocr_extractor::{ExtractionProgressCallback, ExtractorConfig, Stage};
//! use std::sync::Arc;
//!
//! struct Logger;
//!
//! impl ExtractionProgressCallback for Logger {
//!     fn on_stage(&self, stage: Stage) {
//!         eprintln!("→ {}", stage.label());
//!     }
//! }
//!
//! let config = ExtractorConfig::builder()
//!     .progress_callback(Arc::new(Logger) as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Pipeline stage reported through [`ExtractionProgressCallback::on_stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Decoding the uploaded bytes.
    Decoding,
    /// Resizing and thresholding.
    Preprocessing,
    /// PNG + base64 encoding.
    Encoding,
    /// Waiting on / streaming from the model server.
    Inference,
}

impl Stage {
    /// Short human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Decoding => "decoding image",
            Stage::Preprocessing => "preprocessing",
            Stage::Encoding => "encoding",
            Stage::Inference => "waiting for model",
        }
    }
}

/// Called by the pipeline as an extraction progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Implementations must be `Send + Sync` because the
/// web front-end shares one callback across request tasks.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called when the pipeline enters `stage`.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// Called after each text fragment is appended.
    ///
    /// # Arguments
    /// * `fragment`  — the fragment just received
    /// * `total_len` — byte length of the accumulated text so far
    fn on_fragment(&self, fragment: &str, total_len: usize) {
        let _ = (fragment, total_len);
    }

    /// Called once when the stream has ended and the text is final.
    fn on_complete(&self, elapsed: Duration, text_len: usize) {
        let _ = (elapsed, text_len);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractorConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        stages: Mutex<Vec<Stage>>,
        fragments: AtomicUsize,
        last_len: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_stage(&self, stage: Stage) {
            self.stages.lock().unwrap().push(stage);
        }

        fn on_fragment(&self, _fragment: &str, total_len: usize) {
            self.fragments.fetch_add(1, Ordering::SeqCst);
            self.last_len.store(total_len, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_stage(Stage::Decoding);
        cb.on_fragment("abc", 3);
        cb.on_complete(Duration::from_millis(5), 3);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_stage(Stage::Decoding);
        tracker.on_stage(Stage::Inference);
        tracker.on_fragment("Hello ", 6);
        tracker.on_fragment("World", 11);

        assert_eq!(
            *tracker.stages.lock().unwrap(),
            vec![Stage::Decoding, Stage::Inference]
        );
        assert_eq!(tracker.fragments.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.last_len.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn stage_labels_are_distinct() {
        let labels = [
            Stage::Decoding.label(),
            Stage::Preprocessing.label(),
            Stage::Encoding.label(),
            Stage::Inference.label(),
        ];
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
