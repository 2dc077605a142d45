//! Router tests against in-memory stores and a fake ffmpeg.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use crux_api::{create_router, ApiConfig, AppState};
use crux_db::MemoryJobStore;
use crux_models::PROCESSING_PLACEHOLDER_URL;
use crux_storage::MemoryObjectStore;
use crux_worker::{IngestService, WorkerConfig};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "crux-test-boundary";

const FAKE_FFMPEG: &str = r#"sleep 0.3
for arg; do out="$arg"; done
printf 'normalized' > "$out""#;

struct TestApp {
    _root: TempDir,
    router: Router,
    ingest: Arc<IngestService>,
    objects: Arc<MemoryObjectStore>,
}

impl TestApp {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let ffmpeg = fake_ffmpeg(root.path());

        let worker = WorkerConfig::default()
            .with_work_dir(root.path().join("work"))
            .with_ffmpeg_path(ffmpeg)
            .with_transcode_timeout(Duration::from_secs(10));
        let objects = Arc::new(MemoryObjectStore::default());
        let state = AppState::new(
            ApiConfig::default(),
            worker,
            Arc::new(MemoryJobStore::new()),
            objects.clone(),
        );
        let ingest = Arc::clone(&state.ingest);

        Self {
            _root: root,
            router: create_router(state, None),
            ingest,
            objects,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    async fn upload(&self, fields: &[(&str, &str)], video: Option<&[u8]>) -> (StatusCode, Value) {
        let request = Request::post("/api/videos")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(fields, video)))
            .unwrap();
        self.send(request).await
    }

    async fn finish(&self) {
        assert!(self.ingest.wait_idle(Duration::from_secs(20)).await);
    }
}

fn fake_ffmpeg(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("ffmpeg");
    std::fs::write(&path, format!("#!/bin/sh\n{FAKE_FFMPEG}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn multipart_body(fields: &[(&str, &str)], video: Option<&[u8]>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some(video) = video {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"session.mp4\"\r\nContent-Type: video/mp4\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(video);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

const WARM_UP: &[(&str, &str)] = &[
    ("user_id", "climber-1"),
    ("title", "Warm up"),
    ("grade", "5"),
    ("tags", "board,comp"),
];

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["jobs_in_flight"], 0);
}

#[tokio::test]
async fn test_ready_with_reachable_stores() {
    let app = TestApp::new();
    let (status, body) = app.get("/ready").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"]["database"]["status"], "ok");
    assert_eq!(body["checks"]["storage"]["status"], "ok");
}

#[tokio::test]
async fn test_upload_lifecycle() {
    let app = TestApp::new();

    let (status, body) = app.upload(WARM_UP, Some(b"raw footage")).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "processing");
    let job_id = body["job_id"].as_str().unwrap().to_string();

    let (status, video) = app.get(&format!("/api/videos/{job_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(video["status"], "processing");
    assert_eq!(video["video_url"], PROCESSING_PLACEHOLDER_URL);
    assert_eq!(video["thumbnail_url"], PROCESSING_PLACEHOLDER_URL);
    assert_eq!(video["title"], "Warm up");

    app.finish().await;

    let (_, video) = app.get(&format!("/api/videos/{job_id}")).await;
    assert_eq!(video["status"], "completed");
    assert_eq!(video["grade"], 5);
    assert_eq!(video["tags"], serde_json::json!(["board", "comp"]));
    assert!(video.get("video_key").is_none());
    let url = video["video_url"].as_str().unwrap();
    assert!(app.objects.resolve(url).await.is_some());

    let (status, list) = app.get("/api/videos?user_id=climber-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, list) = app.get("/api/videos?user_id=someone-else").await;
    assert!(list.as_array().unwrap().is_empty());

    let (status, tags) = app.get("/api/tags").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags, serde_json::json!(["board", "comp"]));
}

#[tokio::test]
async fn test_upload_without_video_is_rejected() {
    let app = TestApp::new();
    let (status, body) = app.upload(WARM_UP, None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("video file is required"));

    let (_, list) = app.get("/api/videos").await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_with_bad_metadata_is_rejected() {
    let app = TestApp::new();

    let (status, _) = app
        .upload(&[("user_id", "climber-1"), ("grade", "42")], Some(b"raw"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .upload(&[("user_id", "climber-1"), ("grade", "V4")], Some(b"raw"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.upload(&[("title", "No owner")], Some(b"raw")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_video_is_not_found() {
    let app = TestApp::new();

    let (status, body) = app
        .get("/api/videos/550e8400-e29b-41d4-a716-446655440000")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());

    let (status, _) = app.get("/api/videos/not-a-uuid").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_waits_for_terminal_status() {
    let app = TestApp::new();
    let (_, body) = app.upload(WARM_UP, Some(b"raw footage")).await;
    let uri = format!("/api/videos/{}", body["job_id"].as_str().unwrap());

    let (status, _) = app
        .send(Request::delete(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.finish().await;
    assert!(!app.objects.is_empty().await);

    let (status, _) = app
        .send(Request::delete(&uri).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(app.objects.is_empty().await);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-123");
}
