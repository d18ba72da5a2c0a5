//! CLI binary for ocr-extractor.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractorConfig`, runs one extraction and prints the result, or starts
//! the upload-form web front-end with `--serve`.

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use ocr_extractor::extract::write_atomic;
use ocr_extractor::pipeline::input;
use ocr_extractor::present::{format_elapsed, format_secs, render_html, render_terminal};
use ocr_extractor::{
    extract, extract_stream, ExtractionOutput, ExtractionProgressCallback, ExtractorConfig,
    ProgressCallback, Stage, DEFAULT_MODEL,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner shown while the image is processed and the model is answering.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Processing image… Please wait");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    /// Clear the spinner when the run fails before `on_complete`.
    fn abandon(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: Stage) {
        self.bar.set_message(stage.label());
    }

    fn on_fragment(&self, _fragment: &str, total_len: usize) {
        self.bar.set_message(format!("{total_len} chars received"));
    }

    fn on_complete(&self, elapsed: Duration, text_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {}  {}",
            green("✔"),
            bold("OCR Completed Successfully!"),
            dim(&format!("{text_len} chars, {:.2}s", elapsed.as_secs_f64())),
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract and show the image summary next to the text
  ocrx receipt.jpg

  # Only the text, for piping
  ocrx --raw scan.png | wc -w

  # Print text while the model is still generating
  ocrx --stream scan.png

  # Write the text to a file and a side-by-side HTML report
  ocrx photo.jpeg -o photo.txt --html photo.html

  # JSON output with stats
  ocrx --json receipt.jpg > receipt.json

  # Another model on a remote Ollama host
  ocrx --model llama3.2-vision --ollama-host 192.168.1.20 receipt.jpg

  # Web front-end with an upload form
  ocrx --serve 127.0.0.1:8080

SUPPORTED INPUT:
  .jpg .jpeg .png (extension checked case-insensitively)

PREPROCESSING:
  The longest edge is scaled down to --max-dimension (default 1200 px) by
  area averaging, then the image is binarized with an adaptive Gaussian
  threshold (--block-size 17, --threshold-c 7) before it is sent.

ENVIRONMENT VARIABLES:
  OLLAMA_HOST          Ollama host, e.g. 127.0.0.1:11434
  OCRX_ENDPOINT        Full generate endpoint URL (overrides OLLAMA_HOST)
  OCRX_MODEL           Override model name
  OCRX_PROMPT          Override prompt text
  OCRX_TIMEOUT         Whole-request timeout in seconds (unset = no limit)
  RUST_LOG             tracing filter, e.g. ocr_extractor=debug

SETUP:
  1. Install Ollama:  https://ollama.com
  2. Pull the model:  ollama pull qwen2.5vl:3b
  3. Extract:         ocrx receipt.jpg
"#;

/// Extract text from images with a local Vision Language Model.
#[derive(Parser, Debug)]
#[command(
    name = "ocrx",
    version,
    about = "Extract text from images with a local Vision Language Model",
    long_about = "Extract the text of a photographed or scanned image (jpg, jpeg, png). The image \
is resized and binarized, then sent to a Vision Language Model served by Ollama; the streamed \
answer is collected and printed together with the elapsed time.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image file (.jpg, .jpeg or .png).
    #[arg(required_unless_present = "serve")]
    input: Option<PathBuf>,

    /// Serve the upload-form web front-end on this address instead.
    #[arg(long, env = "OCRX_SERVE", conflicts_with = "input")]
    serve: Option<SocketAddr>,

    /// Write the extracted text (or the JSON, with `--json`) to this file
    /// instead of stdout.
    #[arg(short, long, env = "OCRX_OUTPUT")]
    output: Option<PathBuf>,

    /// Also write a side-by-side HTML report to this file.
    #[arg(long, env = "OCRX_HTML")]
    html: Option<PathBuf>,

    /// Output structured JSON (text + stats) instead of the two-column view.
    #[arg(long, env = "OCRX_JSON", conflicts_with_all = ["raw", "stream"])]
    json: bool,

    /// Print only the extracted text.
    #[arg(long, env = "OCRX_RAW")]
    raw: bool,

    /// Print text fragments as they arrive.
    #[arg(long, env = "OCRX_STREAM", conflicts_with_all = ["output", "html"])]
    stream: bool,

    /// Vision model name as known to Ollama.
    #[arg(long, env = "OCRX_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// Full generate endpoint URL.
    #[arg(long, env = "OCRX_ENDPOINT", conflicts_with = "ollama_host")]
    endpoint: Option<String>,

    /// Ollama host (`host`, `host:port` or `http://host:port`).
    #[arg(long, env = "OLLAMA_HOST")]
    ollama_host: Option<String>,

    /// Instruction sent with the image.
    #[arg(long, env = "OCRX_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Path to a text file containing the instruction.
    #[arg(long, env = "OCRX_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Longest edge after resizing, in pixels.
    #[arg(long, env = "OCRX_MAX_DIMENSION", default_value_t = 1200,
          value_parser = clap::value_parser!(u32).range(1..))]
    max_dimension: u32,

    /// Adaptive-threshold neighbourhood size (odd, ≥ 3).
    #[arg(long, env = "OCRX_BLOCK_SIZE", default_value_t = 17)]
    block_size: u32,

    /// Constant subtracted from the local mean before thresholding.
    #[arg(long, env = "OCRX_THRESHOLD_C", default_value_t = 7, allow_negative_numbers = true)]
    threshold_c: i32,

    /// Whole-request timeout in seconds (default: wait indefinitely).
    #[arg(long, env = "OCRX_TIMEOUT")]
    timeout: Option<u64>,

    /// Connection timeout in seconds.
    #[arg(long, env = "OCRX_CONNECT_TIMEOUT", default_value_t = 10)]
    connect_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "OCRX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "OCRX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "OCRX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level feedback; keep library logs quiet while
    // it is on screen.
    let serving = cli.serve.is_some();
    let show_progress = !serving && !cli.quiet && !cli.no_progress && !cli.json && !cli.stream;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Serve mode ───────────────────────────────────────────────────────
    if let Some(addr) = cli.serve {
        let config = build_config(&cli, None).await?;
        return serve(addr, config).await;
    }

    let input_path = cli
        .input
        .clone()
        .context("An input image is required")?;

    let spinner = show_progress.then(CliProgressCallback::new);
    let progress_cb: Option<ProgressCallback> = spinner
        .clone()
        .map(|cb| cb as Arc<dyn ExtractionProgressCallback>);
    let config = build_config(&cli, progress_cb).await?;

    // ── Streaming mode ───────────────────────────────────────────────────
    if cli.stream {
        return run_stream(&cli, &input_path, &config).await;
    }

    // ── Run extraction ───────────────────────────────────────────────────
    let result = extract(&input_path, &config).await;
    if let (Err(_), Some(spinner)) = (&result, &spinner) {
        spinner.abandon();
    }
    let output =
        result.with_context(|| format!("Extraction failed for {}", input_path.display()))?;

    if let Some(ref html_path) = cli.html {
        let html = render_html(&output, None);
        write_atomic(html_path, html.into_bytes())
            .await
            .context("Failed to write HTML report")?;
        if !cli.quiet {
            eprintln!("{} report  →  {}", cyan("◆"), bold(&html_path.display().to_string()));
        }
    }

    if let Some(ref output_path) = cli.output {
        let contents = file_contents(&output, cli.json)?;
        write_atomic(output_path, contents.into_bytes())
            .await
            .context("Failed to write output file")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} chars  {}  →  {}",
                green("✔"),
                output.text.chars().count(),
                format_secs(output.stats.total_secs()),
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if cli.json {
        handle
            .write_all(file_contents(&output, true)?.as_bytes())
            .context("Failed to write to stdout")?;
    } else if cli.raw {
        handle
            .write_all(output.text.as_bytes())
            .context("Failed to write to stdout")?;
        // Ensure a trailing newline on stdout.
        if !output.text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
        if !cli.quiet {
            eprintln!("{}", dim(&format_secs(output.stats.total_secs())));
        }
    } else {
        handle
            .write_all(render_terminal(&output).as_bytes())
            .context("Failed to write to stdout")?;
    }

    Ok(())
}

/// What `-o` writes: pretty JSON with `--json`, otherwise the bare text.
fn file_contents(output: &ExtractionOutput, json: bool) -> Result<String> {
    if json {
        let mut out =
            serde_json::to_string_pretty(output).context("Failed to serialise output")?;
        out.push('\n');
        Ok(out)
    } else {
        Ok(output.text.clone())
    }
}

/// Print fragments as they arrive, then the elapsed time.
async fn run_stream(cli: &Cli, input_path: &Path, config: &ExtractorConfig) -> Result<()> {
    let start = Instant::now();
    let bytes = input::read_file(input_path)
        .await
        .with_context(|| format!("Failed to read {}", input_path.display()))?;

    let mut fragments = extract_stream(&bytes, config)
        .await
        .context("Extraction failed")?;

    let stdout = io::stdout();
    let mut ends_with_newline = true;
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment.context("Extraction failed mid-stream")?;
        if fragment.is_empty() {
            continue;
        }
        ends_with_newline = fragment.ends_with('\n');
        let mut handle = stdout.lock();
        handle
            .write_all(fragment.as_bytes())
            .and_then(|_| handle.flush())
            .context("Failed to write to stdout")?;
    }
    if !ends_with_newline {
        println!();
    }

    if !cli.quiet {
        eprintln!("{}", dim(&format_elapsed(start.elapsed())));
    }
    Ok(())
}

#[cfg(feature = "server")]
async fn serve(addr: SocketAddr, config: ExtractorConfig) -> Result<()> {
    ocr_extractor::server::serve(addr, config)
        .await
        .with_context(|| format!("Web front-end on {addr} failed"))
}

#[cfg(not(feature = "server"))]
async fn serve(_addr: SocketAddr, _config: ExtractorConfig) -> Result<()> {
    anyhow::bail!("This build of ocrx was compiled without the `server` feature")
}

/// Map CLI args to `ExtractorConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ExtractorConfig> {
    let prompt = if let Some(ref path) = cli.prompt_file {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        )
    } else {
        cli.prompt.clone()
    };

    let mut builder = ExtractorConfig::builder()
        .model(&cli.model)
        .max_dimension(cli.max_dimension)
        .block_size(cli.block_size)
        .threshold_c(cli.threshold_c)
        .request_timeout_secs(cli.timeout)
        .connect_timeout_secs(cli.connect_timeout);

    if let Some(ref endpoint) = cli.endpoint {
        builder = builder.endpoint(endpoint);
    } else if let Some(ref host) = cli.ollama_host {
        builder = builder.ollama_host(host);
    }
    if let Some(prompt) = prompt {
        builder = builder.prompt(prompt.trim());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
