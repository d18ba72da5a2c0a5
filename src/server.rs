//! Web front-end: an upload form that runs one extraction per submission.
//!
//! Routes:
//!
//! | Method | Path       | Response |
//! |--------|------------|----------|
//! | GET    | `/`        | upload form |
//! | POST   | `/extract` | multipart field `file` → result page (image + text + time) |
//! | GET    | `/health`  | `OK` |
//!
//! Extractions are serialized through a one-permit semaphore: a small local
//! model handles one image at a time, and queueing requests here keeps a
//! second upload from doubling the latency of the first.

use crate::config::ExtractorConfig;
use crate::error::OcrError;
use crate::extract::extract_from_bytes;
use crate::pipeline::input::check_extension;
use crate::present::{render_error_page, render_html, render_upload_page};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Largest accepted request body.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

const EXTRACT_PATH: &str = "/extract";

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    config: Arc<ExtractorConfig>,
    permit: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config: Arc::new(config),
            permit: Arc::new(Semaphore::new(1)),
        }
    }
}

/// Build the router with every route mounted.
pub fn router(config: ExtractorConfig) -> Router {
    Router::new()
        .route("/", get(index))
        .route(EXTRACT_PATH, post(extract_upload))
        .route("/health", get(|| async { "OK" }))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(AppState::new(config))
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, config: ExtractorConfig) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        "OCR front-end listening on http://{} (model {}, endpoint {})",
        listener.local_addr()?,
        config.model,
        config.endpoint
    );
    axum::serve(listener, router(config))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

async fn index() -> Html<String> {
    Html(render_upload_page(EXTRACT_PATH))
}

/// An uploaded file pulled out of the multipart body.
struct Upload {
    name: String,
    bytes: Vec<u8>,
}

async fn extract_upload(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err((status, message)) => {
            warn!("Rejected upload: {}", message);
            return error_page(status, &message);
        }
    };

    let _permit = match state.permit.acquire().await {
        Ok(permit) => permit,
        Err(_) => {
            return error_page(StatusCode::SERVICE_UNAVAILABLE, "Server is shutting down");
        }
    };

    info!("Extracting '{}' ({} bytes)", upload.name, upload.bytes.len());
    match extract_from_bytes(&upload.bytes, &state.config).await {
        Ok(output) => Html(render_html(&output, Some(EXTRACT_PATH))).into_response(),
        Err(e) => {
            warn!("Extraction of '{}' failed: {}", upload.name, e);
            error_page(status_for(&e), &e.to_string())
        }
    }
}

/// Find the `file` field and check its name before reading the bytes.
async fn read_upload(multipart: &mut Multipart) -> Result<Upload, (StatusCode, String)> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid form data: {e}")))?;

        let Some(field) = field else {
            return Err((
                StatusCode::BAD_REQUEST,
                "No file uploaded (expected a form field named 'file')".to_string(),
            ));
        };

        if field.name() != Some("file") {
            continue;
        }

        let name = field.file_name().unwrap_or_default().to_string();
        check_extension(&name).map_err(|e| (status_for(&e), e.to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, format!("Failed to read upload: {e}")))?;
        if bytes.is_empty() {
            let e = OcrError::EmptyUpload;
            return Err((status_for(&e), e.to_string()));
        }

        return Ok(Upload {
            name,
            bytes: bytes.to_vec(),
        });
    }
}

/// HTTP status for an extraction error.
pub fn status_for(err: &OcrError) -> StatusCode {
    match err {
        OcrError::UnsupportedExtension { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        e if e.is_upload_error() => StatusCode::BAD_REQUEST,
        OcrError::RequestTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        e if e.is_inference_error() => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_page(status: StatusCode, message: &str) -> Response {
    (status, Html(render_error_page(message, Some(EXTRACT_PATH)))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_errors_are_client_errors() {
        assert_eq!(
            status_for(&OcrError::UnsupportedExtension { name: "a.gif".into() }),
            StatusCode::UNSUPPORTED_MEDIA_TYPE
        );
        assert_eq!(status_for(&OcrError::EmptyUpload), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&OcrError::DecodeFailed {
                detail: "x".into()
            }),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn server_errors_are_gateway_errors() {
        assert_eq!(
            status_for(&OcrError::EndpointUnreachable {
                endpoint: "http://localhost:11434/api/generate".into(),
                detail: "refused".into(),
            }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&OcrError::RequestTimeout {
                endpoint: "e".into(),
                secs: 5
            }),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&OcrError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
