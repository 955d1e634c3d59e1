use std::path::Path;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docchat::config::{Config, StoreBackend};
use docchat::memory::MemoryAccessor;
use docchat::server::router;
use docchat_core::answer::GUIDANCE_MESSAGE;
use docchat_core::store::memory::InMemoryStore;
use docchat_core::store::KnowledgeStore;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "docchat-test-boundary";

fn test_config(upload_dir: &Path) -> Config {
    let mut config = Config::minimal();
    config.server.upload_dir = Some(upload_dir.to_path_buf());
    config.streaming.delay_ms = 0;
    config
}

fn app(config: &Config, store: Arc<InMemoryStore>) -> Router {
    let store: Arc<dyn KnowledgeStore> = store;
    router(config, MemoryAccessor::fixed(store))
}

/// Router whose store cannot be opened: the store's parent is a file.
fn unopenable_store_app(dir: &Path) -> Router {
    let blocker = dir.join("blocker");
    std::fs::write(&blocker, b"not a directory").unwrap();

    let mut config = test_config(dir);
    config.store.backend = StoreBackend::Sqlite;
    config.store.path = blocker.join("kb.sqlite");
    router(&config, MemoryAccessor::from_config(Arc::new(config.clone())))
}

fn multipart_body(field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn chat_request(json: &str) -> Request<Body> {
    Request::post("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

// ============ /api/upload ============

#[tokio::test]
async fn upload_ingests_file_and_removes_temp_copy() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let app = app(&test_config(tmp.path()), store.clone());

    let response = app
        .oneshot(upload_request(multipart_body(
            "file",
            "Quarterly Report.pdf",
            b"revenue grew",
        )))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "File ingested into knowledge store");

    let paths = store.ingested_paths();
    assert_eq!(paths.len(), 1);
    let name = paths[0].file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("docchat-upload-"), "unexpected name {}", name);
    assert!(name.ends_with("-Quarterly_Report.pdf"), "unexpected name {}", name);
    assert!(!paths[0].exists());
    assert!(dir_is_empty(tmp.path()));
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let app = app(&test_config(tmp.path()), store.clone());

    let response = app
        .oneshot(upload_request(multipart_body("other", "a.pdf", b"x")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "No file provided"})
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn upload_ingest_failure_is_500_and_cleans_up() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new().with_ingest_failure("index locked"));
    let app = app(&test_config(tmp.path()), store.clone());

    let response = app
        .oneshot(upload_request(multipart_body("file", "a.docx", b"x")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["error"], "ingestion failed: store error: index locked");
    assert!(dir_is_empty(tmp.path()));
}

#[tokio::test]
async fn upload_ingest_failure_can_be_hidden() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.ingest.fail_on_error = false;
    let store = Arc::new(InMemoryStore::new().with_ingest_failure("index locked"));
    let app = app(&config, store);

    let response = app
        .oneshot(upload_request(multipart_body("file", "a.docx", b"x")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["success"], true);
    assert!(dir_is_empty(tmp.path()));
}

#[tokio::test]
async fn upload_that_is_not_multipart_is_500() {
    let tmp = TempDir::new().unwrap();
    let app = app(&test_config(tmp.path()), Arc::new(InMemoryStore::new()));

    let response = app
        .oneshot(
            Request::post("/api/upload")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
}

// ============ /api/chat ============

#[tokio::test]
async fn chat_streams_answer_word_by_word() {
    let tmp = TempDir::new().unwrap();
    let answer = "Revenue grew 12% year over year.";
    let store = Arc::new(InMemoryStore::new().with_answer(answer));
    let app = app(&test_config(tmp.path()), store);

    let response = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"},{"role":"user","content":"How did revenue change?"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers[header::CONNECTION], "keep-alive");

    let body = body_string(response).await;
    assert!(body.ends_with(' '));
    assert_eq!(body.strip_suffix(' '), Some(answer));
}

#[tokio::test]
async fn chat_replaces_no_results_with_guidance() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new().with_answer("NO RELEVANT INFORMATION FOUND."));
    let app = app(&test_config(tmp.path()), store);

    let response = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"What is the capital of Mars?"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert_eq!(body.strip_suffix(' '), Some(GUIDANCE_MESSAGE));
}

#[tokio::test]
async fn chat_answers_from_uploaded_document() {
    let tmp = TempDir::new().unwrap();
    let store = Arc::new(InMemoryStore::new());
    let config = test_config(tmp.path());

    let response = app(&config, store.clone())
        .oneshot(upload_request(multipart_body(
            "file",
            "notes.pdf",
            b"The launch date is March 3.",
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&config, store)
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"launch date"}]}"#,
        ))
        .await
        .unwrap();
    let body = body_string(response).await;
    assert_eq!(body.strip_suffix(' '), Some("The launch date is March 3."));
}

#[tokio::test]
async fn chat_with_empty_messages_is_400() {
    let tmp = TempDir::new().unwrap();
    let app = app(
        &test_config(tmp.path()),
        Arc::new(InMemoryStore::new().with_answer("unused")),
    );

    let response = app
        .oneshot(chat_request(r#"{"messages":[]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "messages must not be empty"})
    );
}

#[tokio::test]
async fn chat_with_empty_messages_is_400_even_if_store_is_unavailable() {
    let tmp = TempDir::new().unwrap();
    let app = unopenable_store_app(tmp.path());

    let response = app
        .oneshot(chat_request(r#"{"messages":[]}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "messages must not be empty"})
    );
}

#[tokio::test]
async fn chat_with_unavailable_store_is_500() {
    let tmp = TempDir::new().unwrap();
    let app = unopenable_store_app(tmp.path());

    let response = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"anything"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Failed to open knowledge store"),
        "json={}",
        json
    );
}

#[tokio::test(start_paused = true)]
async fn chat_applies_configured_word_delay() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(tmp.path());
    config.streaming.delay_ms = 20;
    let answer = "one two three four five";
    let app = app(&config, Arc::new(InMemoryStore::new().with_answer(answer)));

    let start = tokio::time::Instant::now();
    let response = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"count"}]}"#,
        ))
        .await
        .unwrap();
    let body = body_string(response).await;

    assert_eq!(body.strip_suffix(' '), Some(answer));
    let words = answer.split(' ').count() as u32;
    assert!(
        start.elapsed() >= std::time::Duration::from_millis(20) * (words - 1),
        "elapsed {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn chat_with_malformed_body_is_500() {
    let tmp = TempDir::new().unwrap();
    let app = app(&test_config(tmp.path()), Arc::new(InMemoryStore::new()));

    let response = app.oneshot(chat_request("{not json")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn chat_query_failure_is_500_with_message() {
    let tmp = TempDir::new().unwrap();
    let app = app(
        &test_config(tmp.path()),
        Arc::new(InMemoryStore::new().with_query_failure("store unreadable")),
    );

    let response = app
        .oneshot(chat_request(
            r#"{"messages":[{"role":"user","content":"anything"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"error": "store error: store unreadable"})
    );
}

// ============ misc ============

#[tokio::test]
async fn health_reports_version() {
    let tmp = TempDir::new().unwrap();
    let app = app(&test_config(tmp.path()), Arc::new(InMemoryStore::new()));

    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let tmp = TempDir::new().unwrap();
    let app = app(&test_config(tmp.path()), Arc::new(InMemoryStore::new()));

    let response = app
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "http://localhost:5173")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
