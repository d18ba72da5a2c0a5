//! Presentation: the processed image next to the extracted text, plus the
//! elapsed time.
//!
//! Two renderings share the same layout. [`render_terminal`] puts an image
//! summary and the text side by side in plain columns for the CLI.
//! [`render_html`] produces a self-contained dark-themed page with the PNG
//! embedded as a data URI; the CLI writes it with `--html` and the web
//! front-end returns it directly.

use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::encode::to_base64;
use std::fmt::Write as _;
use std::time::Duration;

/// Page title used by every HTML rendering.
pub const PAGE_TITLE: &str = "AI OCR Extractor";

/// Width of the left (image) column in terminal output.
const TERMINAL_LEFT_WIDTH: usize = 30;

/// `Time Taken: 1.23 sec`
pub fn format_elapsed(elapsed: Duration) -> String {
    format_secs(elapsed.as_secs_f64())
}

pub fn format_secs(secs: f64) -> String {
    format!("Time Taken: {secs:.2} sec")
}

// ── Terminal ─────────────────────────────────────────────────────────────

/// Lines describing the processed image, for the left column.
fn image_summary(stats: &ExtractionStats) -> Vec<String> {
    let mut lines = vec![
        "Uploaded Image".to_string(),
        "─".repeat(TERMINAL_LEFT_WIDTH - 2),
        format!(
            "original  {}x{}",
            stats.original_width, stats.original_height
        ),
        format!(
            "processed {}x{}",
            stats.processed_width, stats.processed_height
        ),
        format!("png       {} KiB", stats.png_bytes.div_ceil(1024)),
        format!("model     {}", stats.model),
    ];
    if let Some(tokens) = stats.output_tokens {
        lines.push(format!("tokens    {tokens}"));
    }
    lines
}

/// Lay out two blocks of lines side by side, padding the left one.
pub fn side_by_side(left: &[String], right: &[String], left_width: usize) -> String {
    let rows = left.len().max(right.len());
    let mut out = String::new();
    for i in 0..rows {
        let l = left.get(i).map(String::as_str).unwrap_or("");
        let r = right.get(i).map(String::as_str).unwrap_or("");
        let pad = left_width.saturating_sub(l.chars().count());
        let line = format!("{l}{}│ {r}", " ".repeat(pad));
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Two-column terminal rendering followed by the time line.
pub fn render_terminal(output: &ExtractionOutput) -> String {
    let left = image_summary(&output.stats);

    let mut right = vec![
        "Extracted Text".to_string(),
        "─".repeat(40),
    ];
    right.extend(output.text.lines().map(str::to_string));

    let mut out = side_by_side(&left, &right, TERMINAL_LEFT_WIDTH);
    out.push('\n');
    out.push_str(&format_secs(output.stats.total_secs()));
    out.push('\n');
    out
}

// ── HTML ─────────────────────────────────────────────────────────────────

/// Escape text for use inside HTML element content and attribute values.
pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"<style>
  body { background-color: #0d1117; color: #c9d1d9; font-family: system-ui, sans-serif; margin: 0 2rem; }
  .main-title { font-size: 38px; font-weight: 700; text-align: center; color: #58a6ff; padding: 15px 0 5px 0; }
  .sub-header { font-size: 20px; font-weight: 600; margin-top: 15px; color: #79c0ff; }
  .columns { display: flex; gap: 2rem; }
  .columns > div { flex: 1; min-width: 0; }
  .columns img { width: 100%; border: 1px solid #30363d; background: #fff; }
  textarea { width: 100%; height: 500px; background-color: #0d1117; color: #c9d1d9; border: 1px solid #30363d; font-family: ui-monospace, monospace; }
  .time-box { padding: 12px 20px; background-color: #1e90ff; color: white; font-size: 20px; font-weight: bold; text-align: center; border-radius: 8px; width: 250px; margin-top: 15px; }
  .status { background: #161b22; padding: 12px; border-radius: 8px; border-left: 5px solid #238636; margin-top: 15px; }
  .status.error { border-left-color: #da3633; }
  form { margin-top: 15px; }
</style>"#;

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<title>{title}</title>\n{STYLE}\n</head>\n<body>\n\
<div class=\"main-title\">{title}</div>\n{body}\n</body>\n</html>\n",
        title = PAGE_TITLE
    )
}

/// Upload form posting a `file` field to `action`.
pub fn upload_form(action: &str) -> String {
    format!(
        "<form action=\"{}\" method=\"post\" enctype=\"multipart/form-data\">\n\
<label>Upload your image <input type=\"file\" name=\"file\" accept=\".jpg,.jpeg,.png\" required></label>\n\
<button type=\"submit\">Extract</button>\n</form>",
        html_escape(action)
    )
}

/// The start page of the web front-end.
pub fn render_upload_page(action: &str) -> String {
    page(&upload_form(action))
}

/// Full result page: image and text side by side, time box below.
///
/// When `form_action` is set, an upload form is placed above the result so
/// another image can be submitted straight away.
pub fn render_html(output: &ExtractionOutput, form_action: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(action) = form_action {
        body.push_str(&upload_form(action));
        body.push('\n');
    }

    let _ = write!(
        body,
        "<div class=\"status\">OCR Completed Successfully!</div>\n\
<div class=\"columns\">\n\
<div>\n<div class=\"sub-header\">Uploaded Image</div>\n\
<img alt=\"processed image\" src=\"data:image/png;base64,{img}\">\n</div>\n\
<div>\n<div class=\"sub-header\">Extracted Text</div>\n\
<textarea readonly aria-label=\"OCR Output\">{text}</textarea>\n</div>\n\
</div>\n<div class=\"time-box\">{time}</div>",
        img = to_base64(&output.image_png),
        text = html_escape(&output.text),
        time = html_escape(&format_secs(output.stats.total_secs())),
    );

    page(&body)
}

/// Error page with the message and, optionally, the upload form again.
pub fn render_error_page(message: &str, form_action: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(action) = form_action {
        body.push_str(&upload_form(action));
        body.push('\n');
    }
    let _ = write!(
        body,
        "<div class=\"status error\">{}</div>",
        html_escape(message).replace('\n', "<br>")
    );
    page(&body)
}
