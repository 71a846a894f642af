use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, StatusCode, header},
};
use std::sync::Arc;
use tower::ServiceExt;
use yodo::{
    routes::routes::app,
    services::{disk_store::DiskStore, memory_store::MemoryStore, object_store::ObjectStore},
    state::AppState,
};

const HOST: &str = "yodo.test";
const BOUNDARY: &str = "yodo-test-boundary";

// A 1x1 PNG.
const PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

fn memory_app(max_size: usize) -> Router {
    app(AppState::new(Arc::new(MemoryStore::new(max_size)), None))
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

fn raw_upload(body: &[u8], content_type: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/").header(header::HOST, HOST);
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder.body(Body::from(body.to_vec())).unwrap()
}

fn multipart_upload(part_name: &str, filename: &str, content_type: &str, data: &[u8]) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{part_name}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/")
        .header(header::HOST, HOST)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(path: &str) -> Request<Body> {
    Request::get(path)
        .header(header::HOST, HOST)
        .body(Body::empty())
        .unwrap()
}

fn head(path: &str) -> Request<Body> {
    Request::head(path)
        .header(header::HOST, HOST)
        .body(Body::empty())
        .unwrap()
}

/// Check a 201 response and return the object path it links to.
async fn created_path(response: Response<Body>) -> String {
    assert_eq!(response.status(), StatusCode::CREATED);
    let location = response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.ends_with('\n'));
    let url = body.trim_end();
    assert_eq!(url, location);

    let id = url
        .strip_prefix(&format!("http://{HOST}/"))
        .expect("URL under the request host");
    uuid::Uuid::parse_str(id).expect("id is a UUID");
    format!("/{id}")
}

async fn expect_download(
    app: &Router,
    path: &str,
    data: &[u8],
    content_type: &str,
    disposition: Option<&str>,
) {
    let response = send(app, get(path)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], content_type);
    assert_eq!(
        response.headers()[header::CONTENT_LENGTH],
        data.len().to_string().as_str()
    );
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap()),
        disposition
    );
    assert_eq!(body_bytes(response).await, data);

    assert_eq!(send(app, get(path)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn usage_page() {
    let app = memory_app(1024);
    let response = send(&app, get("/")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(text.contains("YODO"));
    assert!(text.contains("http://yodo.test/"));
    assert!(text.contains("1024 bytes"));
}

#[tokio::test]
async fn raw_post_round_trip() {
    let app = memory_app(1024);
    let path = created_path(send(&app, raw_upload(PNG, Some("image/png"))).await).await;
    expect_download(&app, &path, PNG, "image/png", None).await;
}

#[tokio::test]
async fn raw_post_without_content_type_falls_back() {
    let app = memory_app(1024);
    let path = created_path(send(&app, raw_upload(PNG, None)).await).await;
    expect_download(&app, &path, PNG, "application/octet-stream", None).await;
}

#[tokio::test]
async fn multipart_post_round_trip() {
    let app = memory_app(1024);
    let request = multipart_upload("file", "image.png", "image/png", PNG);
    let path = created_path(send(&app, request).await).await;
    expect_download(
        &app,
        &path,
        PNG,
        "image/png",
        Some("attachment; filename=\"image.png\""),
    )
    .await;
}

#[tokio::test]
async fn multipart_post_with_non_ascii_filename() {
    let app = memory_app(1024);
    let request = multipart_upload("file", "图片.png", "image/png", PNG);
    let path = created_path(send(&app, request).await).await;
    expect_download(
        &app,
        &path,
        PNG,
        "image/png",
        Some("attachment; filename*=UTF-8''%E5%9B%BE%E7%89%87.png"),
    )
    .await;
}

#[tokio::test]
async fn urlencoded_post_is_rejected() {
    let app = memory_app(1024);
    let response = send(
        &app,
        raw_upload(b"file=abc", Some("application/x-www-form-urlencoded")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn multipart_without_file_part_is_rejected() {
    let app = memory_app(1024);
    let response = send(&app, multipart_upload("upload", "a.txt", "text/plain", b"hi")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_bytes(response).await, b"No file part.\n");
}

#[tokio::test]
async fn size_limit_is_exact() {
    let store = Arc::new(MemoryStore::new(16));
    let app = app(AppState::new(store.clone(), None));

    let at_limit = send(&app, raw_upload(&[b'a'; 16], Some("text/plain"))).await;
    assert_eq!(at_limit.status(), StatusCode::CREATED);

    let over = send(&app, raw_upload(&[b'a'; 17], Some("text/plain"))).await;
    assert_eq!(over.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let over_multipart = send(&app, multipart_upload("file", "a.bin", "text/plain", &[b'a'; 17])).await;
    assert_eq!(over_multipart.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let way_over = send(&app, raw_upload(&vec![b'a'; 200 * 1024], None)).await;
    assert_eq!(way_over.status(), StatusCode::PAYLOAD_TOO_LARGE);

    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn head_does_not_consume() {
    let app = memory_app(1024);
    let request = multipart_upload("file", "hi.txt", "text/plain", b"hello");
    let path = created_path(send(&app, request).await).await;

    for _ in 0..3 {
        let response = send(&app, head(&path)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/plain");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "5");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"hi.txt\""
        );
        assert!(response.headers().contains_key(header::LAST_MODIFIED));
    }

    expect_download(
        &app,
        &path,
        b"hello",
        "text/plain",
        Some("attachment; filename=\"hi.txt\""),
    )
    .await;
    assert_eq!(send(&app, head(&path)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let app = memory_app(1024);
    for path in [
        format!("/{}", uuid::Uuid::new_v4()),
        "/not-a-uuid".to_string(),
    ] {
        assert_eq!(send(&app, get(&path)).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(send(&app, head(&path)).await.status(), StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn links_use_configured_base_url() {
    let app = app(AppState::new(
        Arc::new(MemoryStore::new(1024)),
        Some("https://files.example.test".into()),
    ));
    let response = send(&app, raw_upload(b"x", None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(body.starts_with("https://files.example.test/"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_downloads_serve_once() {
    let app = memory_app(1024);
    let path = created_path(send(&app, raw_upload(b"once", None)).await).await;

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..32 {
        let app = app.clone();
        let path = path.clone();
        tasks.spawn(async move { app.oneshot(get(&path)).await.unwrap().status() });
    }

    let mut ok = 0;
    while let Some(status) = tasks.join_next().await {
        match status.unwrap() {
            StatusCode::OK => ok += 1,
            StatusCode::NOT_FOUND => {}
            other => panic!("unexpected status {other}"),
        }
    }
    assert_eq!(ok, 1);
}

#[tokio::test]
async fn disk_backend_serves_once() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(DiskStore::open(dir.path(), 1024).unwrap());
    let app = app(AppState::new(store, None));

    let request = multipart_upload("file", "hi.txt", "text/plain", b"hello");
    let path = created_path(send(&app, request).await).await;
    assert_eq!(send(&app, head(&path)).await.status(), StatusCode::OK);
    expect_download(
        &app,
        &path,
        b"hello",
        "text/plain",
        Some("attachment; filename=\"hi.txt\""),
    )
    .await;
}

#[tokio::test]
async fn health_endpoints() {
    let app = memory_app(1024);
    assert_eq!(send(&app, get("/healthz")).await.status(), StatusCode::OK);

    let response = send(&app, get("/readyz")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["checks"]["memory"]["ok"], true);
}
