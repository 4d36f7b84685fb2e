use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::adapters::InMemoryMetadataAdapter;
use api_lib::config::Config;
use api_lib::documents::PdfFont;
use api_lib::web::session::CookieSigner;
use api_lib::web::{build_router, AppState};
use summarizer_core::ports::SessionMetadataService;
use summarizer_core::SummarizerService;

const BOUNDARY: &str = "summarizer-test-boundary";

struct TestApp {
    router: Router,
    metadata: Arc<InMemoryMetadataAdapter>,
    root: TempDir,
}

fn create_test_app() -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let vars: HashMap<&str, String> = HashMap::from([
        ("IP_HASH_SALT", "pepper".to_string()),
        ("SECRET_KEY", "test-secret".to_string()),
        ("MAX_TOTAL_PAGES", "5".to_string()),
        ("UPLOAD_FOLDER", root.path().join("uploads").display().to_string()),
        ("OUTPUT_FOLDER", root.path().join("outputs").display().to_string()),
    ]);
    let config = Config::from_source(|key| vars.get(key).cloned()).unwrap();

    let metadata = Arc::new(InMemoryMetadataAdapter::new());
    let state = AppState::new(
        Arc::new(config),
        metadata.clone(),
        SummarizerService::offline(),
        CookieSigner::new("test-secret").unwrap(),
        PdfFont::Builtin,
    );
    TestApp {
        router: build_router(Arc::new(state)),
        metadata,
        root,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// The `name=value` part of the session cookie set by a response.
fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("summarizer_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn get(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, cookie: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn upload(cookie: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(header::COOKIE, cookie)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

/// Opens a session and returns its cookie and bucket id.
async fn open_session(app: &TestApp) -> (String, Uuid) {
    let response = send(app, get("/", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response).expect("a new bucket sets its cookie");
    let json = body_json(response).await;
    let bucket_id = Uuid::parse_str(json["bucket_id"].as_str().unwrap()).unwrap();
    (cookie, bucket_id)
}

#[tokio::test]
async fn given_running_server_when_health_check_then_returns_ok_without_cookie() {
    let app = create_test_app();

    for uri in ["/health", "/healthz"] {
        let response = send(&app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(session_cookie(&response).is_none());
        let json = body_json(response).await;
        assert_eq!(json["ok"], Value::Bool(true));
        assert!(json["time"].as_str().unwrap().ends_with('Z'));
    }
}

#[tokio::test]
async fn given_signed_cookie_when_revisiting_then_same_bucket_is_used() {
    let app = create_test_app();
    let (cookie, bucket_id) = open_session(&app).await;

    let response = send(&app, get("/", &cookie)).await;
    assert!(session_cookie(&response).is_none());
    let json = body_json(response).await;
    assert_eq!(json["bucket_id"], Value::String(bucket_id.to_string()));
    assert_eq!(json["options"]["task"], "summary");
    assert_eq!(json["options"]["words"], 800);
    assert_eq!(json["languages"].as_array().unwrap().len(), 16);
    assert_eq!(json["llm_available"], Value::Bool(false));

    let record = app.metadata.get_record(bucket_id).await.unwrap();
    assert!(record.deleted_at.is_none());
}

#[tokio::test]
async fn given_forged_cookie_when_visiting_then_a_new_bucket_is_minted() {
    let app = create_test_app();
    let forged = format!("summarizer_session={}.AAAA", Uuid::new_v4());

    let response = send(&app, get("/", &forged)).await;
    assert!(session_cookie(&response).is_some());
}

#[tokio::test]
async fn given_mixed_uploads_when_uploading_then_each_file_is_judged() {
    let app = create_test_app();
    let (cookie, bucket_id) = open_session(&app).await;

    let response = send(
        &app,
        upload(
            &cookie,
            &[
                ("lecture notes.txt", b"Photosynthesis converts light into chemical energy."),
                ("virus.exe", b"MZ"),
                ("broken.pdf", b"this is not a pdf"),
            ],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["accepted"].as_array().unwrap().len(), 1);
    assert_eq!(json["accepted"][0]["name"], "lecture_notes.txt");
    assert_eq!(json["accepted"][0]["ext"], "TXT");
    assert_eq!(json["rejected"].as_array().unwrap().len(), 2);
    assert_eq!(json["stats"]["files"], 1);
    assert_eq!(json["stats"]["pages"], 1);

    let record = app.metadata.get_record(bucket_id).await.unwrap();
    assert_eq!(record.totals.files, 1);
    assert_eq!(record.totals.pages, 1);
}

#[tokio::test]
async fn given_page_budget_when_exceeded_then_upload_is_refused() {
    let app = create_test_app();
    let (cookie, _) = open_session(&app).await;
    let long_text = "word ".repeat(2600);

    let response = send(&app, upload(&cookie, &[("long.txt", long_text.as_bytes())])).await;
    let json = body_json(response).await;
    assert_eq!(json["accepted"].as_array().unwrap().len(), 0);
    let message = json["rejected"][0].as_str().unwrap();
    assert!(message.contains("6 pages"), "{message}");
}

#[tokio::test]
async fn given_uploads_when_generating_offline_then_scaffold_is_stored_and_exported() {
    let app = create_test_app();
    let (cookie, _) = open_session(&app).await;
    send(&app, upload(&cookie, &[("notes.txt", b"Cells divide by mitosis.")])).await;

    let response = send(
        &app,
        post_json(
            "/generate",
            &cookie,
            serde_json::json!({ "task": "summarize", "words": 50, "language": "polish" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["source"], "fallback");
    assert_eq!(json["options"]["words"], 200);
    assert_eq!(json["options"]["language"], "Polish");
    assert_eq!(json["filename"], "Summary_200w_Polish.txt");
    assert_eq!(json["corpus_files"][0]["name"], "notes.txt");
    let result = json["result_text"].as_str().unwrap().to_string();
    assert!(result.contains("Overview"));
    assert!(result.contains("Conclusion"));

    let index = body_json(send(&app, get("/", &cookie)).await).await;
    assert_eq!(index["result_text"], Value::String(result.clone()));
    assert_eq!(index["options"]["language"], "Polish");

    let response = send(&app, post_json("/export", &cookie, serde_json::json!({}))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
    assert_eq!(disposition, "attachment; filename=\"Summary_200w_Polish.txt\"");
    assert_eq!(body_bytes(response).await, result.trim().as_bytes());
}

#[tokio::test]
async fn given_edited_text_when_exporting_pdf_then_a_pdf_is_returned_and_kept() {
    let app = create_test_app();
    let (cookie, bucket_id) = open_session(&app).await;

    let response = send(
        &app,
        post_json(
            "/export",
            &cookie,
            serde_json::json!({ "result_text": "# Edited\n\nBody text", "output": "pdf" }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let bytes = body_bytes(response).await;
    assert!(bytes.starts_with(b"%PDF"));

    let kept = app
        .root
        .path()
        .join("outputs")
        .join(bucket_id.to_string())
        .join("Summary_800w_English.pdf");
    assert!(kept.exists());
}

#[tokio::test]
async fn given_no_text_when_exporting_then_bad_request() {
    let app = create_test_app();
    let (cookie, _) = open_session(&app).await;

    let response = send(
        &app,
        post_json("/export", &cookie, serde_json::json!({ "result_text": "   " })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn given_uploaded_file_when_removing_then_it_is_gone() {
    let app = create_test_app();
    let (cookie, _) = open_session(&app).await;
    let json = body_json(send(&app, upload(&cookie, &[("a.txt", b"alpha")])).await).await;
    let file_id = json["accepted"][0]["id"].as_str().unwrap().to_string();

    let json = body_json(send(&app, post_empty(&format!("/remove/{file_id}"), &cookie)).await).await;
    assert_eq!(json["removed"], Value::Bool(true));
    assert_eq!(json["stats"]["files"], 0);

    let json = body_json(send(&app, post_empty(&format!("/remove/{file_id}"), &cookie)).await).await;
    assert_eq!(json["removed"], Value::Bool(false));
    assert_eq!(json["message"], "File not found.");
}

#[tokio::test]
async fn given_session_when_resetting_then_files_and_result_are_cleared() {
    let app = create_test_app();
    let (cookie, bucket_id) = open_session(&app).await;
    send(&app, upload(&cookie, &[("a.txt", b"alpha")])).await;
    send(&app, post_json("/generate", &cookie, serde_json::json!({}))).await;

    let response = send(&app, post_empty("/reset", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let expired = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(expired.contains("Max-Age=0"));

    let json = body_json(send(&app, get("/", &cookie)).await).await;
    assert_eq!(json["files"].as_array().unwrap().len(), 0);
    assert_eq!(json["result_text"], Value::Null);
    let record = app.metadata.get_record(bucket_id).await.unwrap();
    assert!(record.deleted_at.is_none());
}

#[tokio::test]
async fn given_privacy_request_when_deleting_then_data_is_erased_and_row_marked() {
    let app = create_test_app();
    let (cookie, bucket_id) = open_session(&app).await;
    send(&app, upload(&cookie, &[("a.txt", b"alpha")])).await;
    let bucket_dir = app.root.path().join("uploads").join(bucket_id.to_string());
    assert!(bucket_dir.exists());

    let response = send(&app, post_empty("/privacy/delete", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let expired = response.headers()[header::SET_COOKIE].to_str().unwrap().to_string();
    assert!(expired.contains("Max-Age=0"));

    assert!(!bucket_dir.exists());
    let record = app.metadata.get_record(bucket_id).await.unwrap();
    assert!(record.deleted_at.is_some());
    assert_eq!(record.totals.files, 0);
}

#[tokio::test]
async fn given_cookieless_visits_when_nothing_is_uploaded_then_no_bucket_directory_is_created() {
    let app = create_test_app();
    for _ in 0..3 {
        let response = send(&app, get("/", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let uploads = app.root.path().join("uploads");
    let entries = std::fs::read_dir(&uploads).map(|d| d.count()).unwrap_or(0);
    assert_eq!(entries, 0);
}

#[tokio::test]
async fn given_deleted_bucket_when_replaying_its_cookie_then_a_fresh_bucket_is_minted() {
    let app = create_test_app();
    let (cookie, bucket_id) = open_session(&app).await;
    send(&app, upload(&cookie, &[("a.txt", b"alpha")])).await;
    send(&app, post_empty("/privacy/delete", &cookie)).await;
    let deleted = app.metadata.get_record(bucket_id).await.unwrap();

    let response = send(&app, get("/", &cookie)).await;
    let fresh_cookie = session_cookie(&response).expect("a fresh bucket sets its cookie");
    assert_ne!(fresh_cookie, cookie);
    let json = body_json(response).await;
    assert_ne!(json["bucket_id"], Value::String(bucket_id.to_string()));

    let json = body_json(send(&app, upload(&cookie, &[("b.txt", b"beta")])).await).await;
    assert_eq!(json["accepted"].as_array().unwrap().len(), 1);

    let bucket_dir = app.root.path().join("uploads").join(bucket_id.to_string());
    assert!(!bucket_dir.exists());
    let record = app.metadata.get_record(bucket_id).await.unwrap();
    assert_eq!(record, deleted);
    assert!(record.deleted_at.is_some());
    assert_eq!(record.totals.files, 0);
}
