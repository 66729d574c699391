use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode, header};
use chrono::{TimeDelta, TimeZone, Utc};
use tempfile::TempDir;
use tower::ServiceExt;

use relay_core::{Clock, ManualClock};
use relay_gc::{GarbageCollector, GcConfig};
use relay_ratelimit::DailyLimits;
use relay_ratelimit_memory::MemoryRateLimiter;
use relay_repository_memory::MemoryFileRepository;
use relay_server::api::{AppState, router};
use relay_server::service::FileService;
use relay_storage_local::LocalFileStorage;

const BOUNDARY: &str = "relay-test-boundary";

// -- Helpers --------------------------------------------------------------

struct TestApp {
    _dir: TempDir,
    app: Router,
    clock: Arc<ManualClock>,
    repository: Arc<MemoryFileRepository>,
    storage: Arc<LocalFileStorage>,
    spool: std::path::PathBuf,
}

async fn build_test_app(limits: DailyLimits) -> TestApp {
    build_test_app_with(limits, 1024 * 1024, false).await
}

async fn build_test_app_with(
    limits: DailyLimits,
    max_upload_bytes: usize,
    trust_proxy: bool,
) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let spool = dir.path().join("spool");
    tokio::fs::create_dir_all(&spool).await.unwrap();

    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
    ));
    let limiter = Arc::new(MemoryRateLimiter::new(limits, clock.clone()));
    let repository = Arc::new(MemoryFileRepository::new(clock.clone()));
    let storage = Arc::new(LocalFileStorage::new(dir.path().join("blobs")));
    storage.init().await.unwrap();

    let service = FileService::new(limiter, repository.clone(), storage.clone(), clock.clone());
    let state = AppState {
        service: Arc::new(service),
        temp_dir: Arc::new(spool.clone()),
        max_upload_bytes,
        trust_proxy,
    };

    TestApp {
        _dir: dir,
        app: router(state),
        clock,
        repository,
        storage,
        spool,
    }
}

fn multipart_body(field: &str, filename: &str, content_type: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
         Content-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Attach `client` as the connection's peer address.
fn from_peer(mut req: Request<Body>, client: &str) -> Request<Body> {
    let ip: std::net::IpAddr = client.parse().unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::new(ip, 40000)));
    req
}

fn upload_request(client: &str, body: Vec<u8>) -> Request<Body> {
    let req = Request::builder()
        .method("POST")
        .uri("/files")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    from_peer(req, client)
}

async fn upload(app: &Router, client: &str, contents: &[u8]) -> (StatusCode, serde_json::Value) {
    let body = multipart_body("file", "note.txt", "text/plain", contents);
    let resp = app.clone().oneshot(upload_request(client, body)).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get(app: &Router, uri: &str, client: &str) -> axum::response::Response {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(from_peer(req, client)).await.unwrap()
}

async fn delete(app: &Router, uri: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

async fn json(resp: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn spool_is_empty(app: &TestApp) -> bool {
    std::fs::read_dir(&app.spool).unwrap().next().is_none()
}

// -- Upload / download / delete ---------------------------------------------

#[tokio::test]
async fn upload_returns_camel_case_keys() {
    let t = build_test_app(DailyLimits::default()).await;
    let (status, body) = upload(&t.app, "10.0.0.1", b"hello").await;

    assert_eq!(status, StatusCode::CREATED);
    let public = body["publicKey"].as_str().unwrap();
    let private = body["privateKey"].as_str().unwrap();
    assert_eq!(public.len(), relay_core::KEY_LEN);
    assert_eq!(private.len(), relay_core::KEY_LEN);
    assert_ne!(public, private);
    assert!(spool_is_empty(&t));
}

#[tokio::test]
async fn download_streams_content_with_headers() {
    let t = build_test_app(DailyLimits::default()).await;
    let (_, body) = upload(&t.app, "10.0.0.1", b"relay me").await;
    let public = body["publicKey"].as_str().unwrap();

    let resp = get(&t.app, &format!("/files/{public}"), "10.0.0.2").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/plain");
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "8");
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"relay me");
}

#[tokio::test]
async fn unknown_public_key_is_404() {
    let t = build_test_app(DailyLimits::default()).await;
    let resp = get(&t.app, "/files/0123456789abcdef0123456789abcdef", "192.0.2.1").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json(resp).await["error"], "file not found");
}

#[tokio::test]
async fn delete_by_private_key() {
    let t = build_test_app(DailyLimits::default()).await;
    let (_, body) = upload(&t.app, "192.0.2.1", b"temporary").await;
    let public = body["publicKey"].as_str().unwrap();
    let private = body["privateKey"].as_str().unwrap();

    // The public key does not authorize deletion.
    assert_eq!(delete(&t.app, &format!("/files/{public}")).await, StatusCode::NOT_FOUND);

    assert_eq!(delete(&t.app, &format!("/files/{private}")).await, StatusCode::NO_CONTENT);
    assert_eq!(delete(&t.app, &format!("/files/{private}")).await, StatusCode::NOT_FOUND);
    assert_eq!(
        get(&t.app, &format!("/files/{public}"), "192.0.2.1").await.status(),
        StatusCode::NOT_FOUND
    );
    assert!(t.repository.is_empty());
}

#[tokio::test]
async fn missing_file_part_is_422() {
    let t = build_test_app(DailyLimits::default()).await;
    let body = multipart_body("attachment", "note.txt", "text/plain", b"wrong field");
    let resp = t.app.clone().oneshot(upload_request("192.0.2.1", body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json(resp).await["error"].as_str().unwrap().contains("file"));
    assert!(t.repository.is_empty());
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let t = build_test_app_with(DailyLimits::default(), 64, false).await;
    let body = multipart_body("file", "big.bin", "application/octet-stream", &[b'x'; 1024]);
    let resp = t.app.clone().oneshot(upload_request("192.0.2.1", body)).await.unwrap();
    assert!(resp.status().is_client_error());
    assert!(t.repository.is_empty());
    assert!(spool_is_empty(&t));
}

// -- Quotas -----------------------------------------------------------------

#[tokio::test]
async fn upload_quota_is_per_client() {
    let t = build_test_app(DailyLimits::new(5, 25)).await;
    for _ in 0..5 {
        let (status, _) = upload(&t.app, "198.51.100.1", b"x").await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = upload(&t.app, "198.51.100.1", b"x").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"], "daily uploads quota exceeded");
    assert!(spool_is_empty(&t));

    let (status, _) = upload(&t.app, "198.51.100.2", b"x").await;
    assert_eq!(status, StatusCode::CREATED);

    t.clock.advance(TimeDelta::days(1));
    let (status, _) = upload(&t.app, "198.51.100.1", b"x").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn download_quota_returns_429() {
    let t = build_test_app(DailyLimits::new(5, 1)).await;
    let (_, body) = upload(&t.app, "192.0.2.2", b"x").await;
    let uri = format!("/files/{}", body["publicKey"].as_str().unwrap());

    assert_eq!(get(&t.app, &uri, "192.0.2.3").await.status(), StatusCode::OK);
    assert_eq!(
        get(&t.app, &uri, "192.0.2.3").await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(get(&t.app, &uri, "192.0.2.4").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn peer_address_is_used_without_forwarding_header() {
    let t = build_test_app(DailyLimits::new(1, 25)).await;
    let make = |port: u16| {
        let mut req = Request::builder()
            .method("POST")
            .uri("/files")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body("file", "a.bin", "application/octet-stream", b"a")))
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 10], port))));
        req
    };

    // Same IP from different source ports shares one quota.
    let first = t.app.clone().oneshot(make(40000)).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = t.app.clone().oneshot(make(40001)).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn forwarded_header_does_not_reset_quota() {
    let t = build_test_app(DailyLimits::new(1, 25)).await;
    let mut statuses = Vec::new();
    for n in 0..4 {
        let body = multipart_body("file", "a.bin", "application/octet-stream", b"a");
        let mut req = upload_request("192.0.2.10", body);
        req.headers_mut()
            .insert("x-forwarded-for", format!("203.0.113.{n}").parse().unwrap());
        statuses.push(t.app.clone().oneshot(req).await.unwrap().status());
    }
    assert_eq!(
        statuses,
        [
            StatusCode::CREATED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

#[tokio::test]
async fn trusted_proxy_charges_forwarded_client() {
    let t = build_test_app_with(DailyLimits::new(1, 25), 1024 * 1024, true).await;
    let send = |forwarded: &'static str| {
        let body = multipart_body("file", "a.bin", "application/octet-stream", b"a");
        let mut req = upload_request("10.0.0.254", body);
        req.headers_mut()
            .insert("x-forwarded-for", forwarded.parse().unwrap());
        t.app.clone().oneshot(req)
    };

    assert_eq!(send("203.0.113.1").await.unwrap().status(), StatusCode::CREATED);
    assert_eq!(send("203.0.113.2").await.unwrap().status(), StatusCode::CREATED);
    assert_eq!(
        send("203.0.113.1, 10.0.0.254").await.unwrap().status(),
        StatusCode::TOO_MANY_REQUESTS
    );
}

// -- Health -----------------------------------------------------------------

#[tokio::test]
async fn health_summary_and_detail() {
    let t = build_test_app(DailyLimits::default()).await;
    t.clock.advance(TimeDelta::seconds(42));

    let resp = get(&t.app, "/health", "192.0.2.1").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json(resp).await;
    assert_eq!(body["healthy"], true);
    assert_eq!(body["uptime"], 42);
    assert!(body.get("timestamp").is_some());
    assert!(body.get("cache").is_none());

    let body = json(get(&t.app, "/health?detail", "192.0.2.1").await).await;
    assert_eq!(body["cache"], true);
    assert_eq!(body["db"], true);
    assert_eq!(body["storage"], true);
}

#[tokio::test]
async fn health_is_503_when_storage_is_gone() {
    let t = build_test_app(DailyLimits::default()).await;
    std::fs::remove_dir_all(t.storage.root()).unwrap();

    let resp = get(&t.app, "/health?detail=1", "192.0.2.1").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json(resp).await;
    assert_eq!(body["healthy"], false);
    assert_eq!(body["storage"], false);
    assert_eq!(body["db"], true);
}

// -- Garbage collection -------------------------------------------------------

#[tokio::test]
async fn inactive_upload_is_collected() {
    let t = build_test_app(DailyLimits::default()).await;
    let (_, stale) = upload(&t.app, "192.0.2.1", b"old").await;
    t.clock.advance(TimeDelta::days(10));
    let (_, fresh) = upload(&t.app, "192.0.2.1", b"new").await;
    t.clock.advance(TimeDelta::days(10));

    let clock: Arc<dyn Clock> = t.clock.clone();
    let gc = GarbageCollector::new(
        t.repository.clone(),
        t.storage.clone(),
        clock,
        GcConfig::default(),
    );
    let report = gc.sweep().await.unwrap();
    assert_eq!(report.deleted, 1);

    let stale_uri = format!("/files/{}", stale["publicKey"].as_str().unwrap());
    let fresh_uri = format!("/files/{}", fresh["publicKey"].as_str().unwrap());
    assert_eq!(get(&t.app, &stale_uri, "192.0.2.1").await.status(), StatusCode::NOT_FOUND);
    assert_eq!(get(&t.app, &fresh_uri, "192.0.2.1").await.status(), StatusCode::OK);
}

// -- API docs -----------------------------------------------------------------

#[tokio::test]
async fn openapi_document_lists_routes() {
    let t = build_test_app(DailyLimits::default()).await;
    let resp = get(&t.app, "/api-doc/openapi.json", "192.0.2.1").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let doc = json(resp).await;
    assert!(doc["paths"]["/files"]["post"].is_object());
    assert!(doc["paths"]["/files/{key}"]["get"].is_object());
    assert!(doc["paths"]["/files/{key}"]["delete"].is_object());
    assert!(doc["paths"]["/health"]["get"].is_object());
    assert!(doc["components"]["schemas"]["UploadResponse"].is_object());
}
