//! HTTP server for the chat front end.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/upload` | Multipart field `file`; ingests it into the store |
//! | `POST` | `/api/chat` | `{messages: [{role, content}]}`; streams the answer |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Every error response is a flat JSON object:
//!
//! ```json
//! { "error": "No file provided" }
//! ```
//!
//! `400` for a missing upload or an empty conversation, `500` for anything
//! else (malformed bodies included). Messages are passed through unredacted.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! served from another origin can call the API.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docchat_core::answer::last_query;
use docchat_core::models::ChatRequest;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::chat::{answer_for, stream_answer, Pacing};
use crate::config::Config;
use crate::memory::MemoryAccessor;
use crate::upload::{process_upload, UploadSettings};

/// Shared state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    memory: MemoryAccessor,
    pacing: Pacing,
    upload: Arc<UploadSettings>,
}

/// Starts the server with the store named in the configuration.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let accessor = MemoryAccessor::from_config(Arc::new(config.clone()));
    run_server_with_accessor(config, accessor).await
}

/// Starts the server with a caller-provided store accessor.
pub async fn run_server_with_accessor(
    config: &Config,
    memory: MemoryAccessor,
) -> anyhow::Result<()> {
    let app = router(config, memory);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        "listening on http://{} (store: {})",
        listener.local_addr()?,
        config.store.path.display()
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Builds the application router.
pub fn router(config: &Config, memory: MemoryAccessor) -> Router {
    let state = AppState {
        memory,
        pacing: Pacing::from_millis(config.streaming.delay_ms),
        upload: Arc::new(UploadSettings {
            dir: config.server.upload_dir(),
            prefix: config.server.upload_prefix.clone(),
            fail_on_error: config.ingest.fail_on_error,
        }),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/upload", post(handle_upload))
        .route("/api/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        internal(format!("{:#}", err))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/upload ============

#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
}

/// Handler for `POST /api/upload`.
///
/// Reads the `file` field, ingests it through a temp file and reports the
/// outcome. Other form fields are ignored.
async fn handle_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::error!(error = %e, "upload processing error");
        internal(e.body_text())
    })?;

    let mut upload: Option<(String, Bytes)> = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!(error = %e, "upload processing error");
        internal(e.body_text())
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let name = field
            .file_name()
            .filter(|n| !n.is_empty())
            .unwrap_or("upload")
            .to_string();
        let bytes = field.bytes().await.map_err(|e| internal(e.body_text()))?;
        upload = Some((name, bytes));
        break;
    }

    let Some((name, bytes)) = upload else {
        return Err(bad_request("No file provided"));
    };

    let store = state.memory.open().await?;
    let outcome = process_upload(store.as_ref(), &state.upload, &name, &bytes)
        .await
        .map_err(|e| internal(e.to_string()))?;

    Ok(Json(UploadResponse {
        success: true,
        message: outcome.message,
    }))
}

// ============ POST /api/chat ============

/// Handler for `POST /api/chat`.
///
/// Validates the conversation before touching the store, then answers the
/// last message and streams the answer word by word as `text/event-stream`.
/// Errors before the first chunk become JSON errors; once streaming has
/// begun the response can only end early.
async fn handle_chat(State(state): State<AppState>, body: Bytes) -> Result<Response, AppError> {
    let request: ChatRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!(error = %e, "chat request parse error");
        internal(e.to_string())
    })?;

    let query = last_query(&request.messages).map_err(|e| {
        tracing::error!(error = %e, "chat request rejected");
        bad_request(e.to_string())
    })?;
    tracing::info!(query = %query, turns = request.messages.len(), "chat query");

    let store = state.memory.open().await.map_err(|e| {
        tracing::error!(error = %format!("{:#}", e), "chat store error");
        AppError::from(e)
    })?;

    let answer = answer_for(store.as_ref(), query).await.map_err(|e| {
        tracing::error!(error = %e, "chat API error");
        internal(e.to_string())
    })?;

    let stream = stream_answer(&answer, state.pacing);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| internal(e.to_string()))
}
