//! Shared helpers: a mock Ollama generate endpoint and test images.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use image::{Rgb, RgbImage};
use ocr_extractor::ExtractorConfig;
use serde_json::Value;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    chunks: Arc<Vec<String>>,
    seen: Arc<Mutex<Vec<Value>>>,
}

/// A local stand-in for `POST /api/generate`.
///
/// Every request gets `status` and a body written as the given chunks, in
/// order, one body frame per chunk.
pub struct MockOllama {
    pub endpoint: String,
    seen: Arc<Mutex<Vec<Value>>>,
}

impl MockOllama {
    pub async fn start(status: StatusCode, chunks: &[&str]) -> Self {
        init_tracing();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            status,
            chunks: Arc::new(chunks.iter().map(|c| c.to_string()).collect()),
            seen: seen.clone(),
        };
        let app = Router::new()
            .route("/api/generate", post(generate))
            .layer(DefaultBodyLimit::disable())
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: format!("http://{addr}/api/generate"),
            seen,
        }
    }

    /// Streams `lines` with 200 OK.
    pub async fn ok(lines: &[&str]) -> Self {
        Self::start(StatusCode::OK, lines).await
    }

    /// Request bodies received so far.
    pub fn requests(&self) -> Vec<Value> {
        self.seen.lock().unwrap().clone()
    }

    pub fn config(&self) -> ExtractorConfig {
        ExtractorConfig::builder()
            .endpoint(&self.endpoint)
            .request_timeout_secs(Some(30))
            .build()
            .unwrap()
    }
}

async fn generate(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    state.seen.lock().unwrap().push(body);
    let frames: Vec<Result<Bytes, Infallible>> = state
        .chunks
        .iter()
        .map(|c| Ok(Bytes::from(c.clone())))
        .collect();
    (
        state.status,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        Body::from_stream(futures::stream::iter(frames)),
    )
        .into_response()
}

/// Route library logs through the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An endpoint on a port nothing listens on.
pub async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/generate")
}

/// White page with dark bars standing in for lines of text.
pub fn text_like_image(width: u32, height: u32) -> RgbImage {
    let mut img = RgbImage::from_pixel(width, height, Rgb([235, 232, 228]));
    let bar_h = (height / 20).max(2);
    let mut y = height / 10;
    while y + bar_h < height - height / 10 {
        for yy in y..y + bar_h {
            for x in width / 10..width - width / 10 {
                // Alternating gaps so the bars look like words.
                if (x / (bar_h * 3)) % 4 != 3 {
                    img.put_pixel(x, yy, Rgb([30, 30, 40]));
                }
            }
        }
        y += bar_h * 3;
    }
    img
}

/// Save `img` under `dir` as `name`; the extension picks the format.
pub fn save_image(dir: &Path, name: &str, img: &RgbImage) -> PathBuf {
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}
