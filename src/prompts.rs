//! Prompts sent alongside the processed image.
//!
//! Callers can override the default via [`crate::config::ExtractorConfig::prompt`];
//! the constant here is used only when no override is provided.

/// Default instruction for verbatim text extraction.
///
/// Kept short on purpose: small vision models (3B class) follow a single
/// imperative sentence far better than a rule list, and the "do not guess or
/// repeat" clause curbs the looping they fall into on sparse images.
pub const DEFAULT_PROMPT: &str =
    "Extract all text exactly as shown in the image. Do NOT guess or repeat.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_asks_for_verbatim_text() {
        assert!(DEFAULT_PROMPT.contains("exactly as shown"));
        assert!(DEFAULT_PROMPT.contains("Do NOT guess"));
    }
}
