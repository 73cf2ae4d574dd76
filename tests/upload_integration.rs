mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use clinic_http::{
    AuthContext, CancellationToken, ClientConfig, HttpClient, RequestOptions, ResponseBody,
    StaticContext, UploadForm, UploadProgress, UPLOAD_CHUNK_SIZE,
};
use common::{spawn_server, MockResponse};
use serde_json::json;

fn client_for(base_url: &str) -> HttpClient {
    HttpClient::new(ClientConfig::new().with_base_url(base_url))
}

#[tokio::test]
async fn upload_reports_progress_and_decodes_json() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::CREATED,
        json!({"documentId": "doc-1"}),
    )])
    .await;
    let client = client_for(&server.base_url).with_context(StaticContext(AuthContext {
        token: Some("tok".to_owned()),
        clinic_id: Some("c-1".to_owned()),
        tenant_id: Some("t-1".to_owned()),
    }));

    let payload = vec![7u8; UPLOAD_CHUNK_SIZE * 2 + 10];
    let form = UploadForm::new()
        .text("patientId", "p-1")
        .file_with_mime("scan", "scan.png", "image/png", payload.clone());

    let ticks: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let recorder = Arc::clone(&ticks);
    let body = client
        .upload_with_progress("/api/documents", form, RequestOptions::new(), move |progress| {
            recorder
                .lock()
                .expect("progress mutex must not be poisoned")
                .push(progress);
        })
        .await
        .expect("upload must succeed");

    assert_eq!(body, ResponseBody::Json(json!({"documentId": "doc-1"})));

    let ticks = ticks.lock().expect("progress mutex must not be poisoned").clone();
    let total = payload.len() as u64;
    assert_eq!(ticks.len(), 3);
    assert!(ticks.iter().all(|tick| tick.total == total));
    assert!(ticks.windows(2).all(|pair| pair[0].loaded < pair[1].loaded));
    let last = ticks.last().expect("at least one tick");
    assert_eq!(last.loaded, total);
    assert_eq!(last.percent, 100);

    let request = server.last_request();
    assert_eq!(request.method, clinic_http::Method::POST);
    assert_eq!(request.header("authorization"), Some("Bearer tok"));
    assert_eq!(request.header("x-clinic-id"), Some("c-1"));
    assert_eq!(request.header("x-tenant-id"), Some("t-1"));
    assert!(request.header("x-request-id").is_some());
    let content_type = request.header("content-type").expect("content type must be set");
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("name=\"patientId\""));
    assert!(body.contains("filename=\"scan.png\""));
}

#[tokio::test]
async fn upload_without_byte_parts_reports_nothing() {
    let server = spawn_server(vec![MockResponse::text(
        StatusCode::OK,
        Some("text/plain"),
        "stored",
    )])
    .await;
    let client = client_for(&server.base_url);

    let ticks = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&ticks);
    let body = client
        .upload_with_progress(
            "/api/notes",
            UploadForm::new().text("note", "hello"),
            RequestOptions::new(),
            move |_| *counter.lock().expect("counter mutex") += 1,
        )
        .await
        .expect("upload must succeed");

    assert_eq!(body, ResponseBody::Text("stored".to_owned()));
    assert_eq!(*ticks.lock().expect("counter mutex"), 0);
}

#[tokio::test]
async fn upload_failure_carries_problem() {
    let server = spawn_server(vec![MockResponse::json(
        StatusCode::PAYLOAD_TOO_LARGE,
        json!({"title": "File too large", "errors": {"scan": ["max 10 MB"]}}),
    )])
    .await;
    let client = client_for(&server.base_url);

    let err = client
        .upload_with_progress(
            "/api/documents",
            UploadForm::new().file("scan", "scan.png", vec![1u8; 16]),
            RequestOptions::new(),
            |_| {},
        )
        .await
        .expect_err("upload must fail");

    assert_eq!(err.status, 413);
    assert_eq!(err.message, "File too large");
    assert_eq!(err.field_errors("scan")[0], "max 10 MB");
}

#[tokio::test]
async fn upload_failure_without_problem_uses_status_message() {
    let server = spawn_server(vec![MockResponse::text(
        StatusCode::BAD_GATEWAY,
        Some("text/html"),
        "<html>bad gateway</html>",
    )])
    .await;
    let client = client_for(&server.base_url);

    let err = client
        .upload_with_progress(
            "/api/documents",
            UploadForm::new().file("scan", "scan.png", vec![1u8; 16]),
            RequestOptions::new(),
            |_| {},
        )
        .await
        .expect_err("upload must fail");

    assert_eq!(err.status, 502);
    assert_eq!(err.message, "Upload failed with status 502");
    assert!(err.problem.is_none());
}

#[tokio::test]
async fn upload_connection_failure_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("must bind");
    let address = listener.local_addr().expect("must have local addr");
    drop(listener);

    let client = client_for(&format!("http://{address}"));
    let err = client
        .upload_with_progress(
            "/api/documents",
            UploadForm::new().file("scan", "scan.png", vec![1u8; 16]),
            RequestOptions::new(),
            |_| {},
        )
        .await
        .expect_err("nothing listens there");

    assert_eq!(err.status, 0);
    assert!(err.problem.is_none());
}

#[tokio::test]
async fn upload_cancellation_aborts_request() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::CREATED, json!({}))
        .with_delay(Duration::from_millis(500))])
    .await;
    let client = client_for(&server.base_url);
    let signal = CancellationToken::new();

    let canceller = {
        let signal = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            signal.cancel();
        })
    };

    let err = client
        .upload_with_progress(
            "/api/documents",
            UploadForm::new().file("scan", "scan.png", vec![1u8; 16]),
            RequestOptions::new().signal(signal),
            |_| {},
        )
        .await
        .expect_err("upload must be aborted");
    canceller.await.expect("canceller must finish");

    assert_eq!(err.status, 0);
    assert_eq!(err.message, "Request aborted");
    assert!(err.problem.is_none());
}

#[tokio::test]
async fn upload_timeout_rejects_with_transport_status() {
    let server = spawn_server(vec![MockResponse::json(StatusCode::CREATED, json!({}))
        .with_delay(Duration::from_millis(500))])
    .await;
    let client = client_for(&server.base_url);

    let started = std::time::Instant::now();
    let err = client
        .upload_with_progress(
            "/api/documents",
            UploadForm::new().file("scan", "scan.png", vec![1u8; 16]),
            RequestOptions::new().timeout(Duration::from_millis(50)),
            |_| {},
        )
        .await
        .expect_err("upload must time out");

    assert_eq!(err.status, 0);
    assert_eq!(err.message, "Request timed out after 50 ms");
    assert!(err.problem.is_none());
    assert!(started.elapsed() < Duration::from_millis(450));
}
