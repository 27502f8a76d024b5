//! Tests for the reqwest backend against a local axum server

use axum::extract::{Multipart, Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use happyshot_core::*;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

async fn upload(
    Query(query): Query<HashMap<String, String>>,
    mut multipart: Multipart,
) -> axum::response::Response {
    let mut received = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.unwrap_or_default();
        received = Some((content_type, file_name, data.len()));
    }

    let Some((content_type, file_name, len)) = received else {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "missing file"}))).into_response();
    };
    if !content_type.starts_with("video/") {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "Invalid file type. Expected video."})),
        )
            .into_response();
    }
    assert_eq!(file_name, "clip.mp4");
    assert!(len > 0);

    if query.contains_key("bucket") {
        Json(json!({"message": "Upload successful"})).into_response()
    } else {
        Json(json!({"job_id": "job-42", "status": "pending"})).into_response()
    }
}

async fn job(Path(id): Path<String>) -> Json<serde_json::Value> {
    Json(json!({
        "job_id": id,
        "status": "completed",
        "created_at": "2024-05-01T10:00:00",
        "completed_at": "2024-05-01T10:02:00",
        "error": null,
        "result": {"faces": 3}
    }))
}

async fn images(Query(query): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
    match query.get("bucket").map(String::as_str) {
        Some("empty") => Json(json!({"images": null})),
        _ => Json(json!({"images": ["https://s3/b/2.jpg", "https://s3/b/1.jpg"]})),
    }
}

async fn download(Query(query): Query<HashMap<String, String>>) -> axum::response::Response {
    if query.get("bucket").map(String::as_str) == Some("missing") {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "bucket not found"})),
        )
            .into_response();
    }
    (
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=images.zip"),
        ],
        vec![0x50u8, 0x4b, 0x03, 0x04, 1, 2, 3],
    )
        .into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/upload", post(upload))
        .route("/jobs/:id", get(job))
        .route("/images", get(images))
        .route("/download", get(download))
        .route("/health", get(health));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn backend(addr: SocketAddr, variant: ProtocolVariant) -> HttpBackend {
    HttpBackend::new(HttpBackendConfig {
        base_url: format!("http://{}", addr),
        variant,
        ..Default::default()
    })
    .unwrap()
}

fn clip() -> CapturedMedia {
    CapturedMedia::new(vec![9u8; 200_000], "video/mp4").with_file_name("clip.mp4")
}

#[tokio::test]
async fn test_upload_job_variant() {
    let addr = serve().await;
    let backend = backend(addr, ProtocolVariant::JobStatus);

    let sent = Arc::new(Mutex::new(Vec::new()));
    let sink = sent.clone();
    let receipt = backend
        .upload(&clip(), None, Arc::new(move |s, t| sink.lock().push((s, t))))
        .await
        .unwrap();

    match receipt {
        UploadReceipt::Job(job) => {
            assert_eq!(job.job_id, "job-42");
            assert_eq!(job.status, JobStatus::Pending);
        }
        other => panic!("Expected job receipt, got {:?}", other),
    }

    let sent = sent.lock().clone();
    assert!(sent.len() > 1);
    assert_eq!(sent.last(), Some(&(200_000, 200_000)));
    assert!(sent.windows(2).all(|w| w[0].0 <= w[1].0));
}

#[tokio::test]
async fn test_upload_direct_variant_uses_caller_bucket() {
    let addr = serve().await;
    let backend = backend(addr, ProtocolVariant::Direct);

    let receipt = backend
        .upload(&clip(), Some("party-2024"), Arc::new(|_, _| {}))
        .await
        .unwrap();
    assert_eq!(
        receipt,
        UploadReceipt::Direct {
            bucket_id: "party-2024".to_string()
        }
    );
}

#[tokio::test]
async fn test_upload_rejected_with_detail() {
    let addr = serve().await;
    let backend = backend(addr, ProtocolVariant::JobStatus);

    let photo = CapturedMedia::new(vec![1u8; 64], "image/jpeg");
    let result = backend.upload(&photo, None, Arc::new(|_, _| {})).await;
    match result {
        Err(CoreError::UploadRejected { http_status, message }) => {
            assert_eq!(http_status, 400);
            assert_eq!(message, "Invalid file type. Expected video.");
        }
        other => panic!("Expected UploadRejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_job_status_parses_response() {
    let addr = serve().await;
    let job = backend(addr, ProtocolVariant::JobStatus)
        .job_status("job-42")
        .await
        .unwrap();

    assert_eq!(job.job_id, "job-42");
    assert_eq!(job.status, JobStatus::Completed);
    assert!(job.completed_at.is_some());
    assert_eq!(job.result, Some(json!({"faces": 3})));
}

#[tokio::test]
async fn test_list_images_order_and_null() {
    let addr = serve().await;
    let backend = backend(addr, ProtocolVariant::JobStatus);

    let images = backend.list_images("job-42").await.unwrap();
    assert_eq!(images, vec!["https://s3/b/2.jpg", "https://s3/b/1.jpg"]);
    assert!(backend.list_images("empty").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_download_all_through_http() {
    let addr = serve().await;
    let fetcher = AlbumFetcher::new(Arc::new(backend(addr, ProtocolVariant::JobStatus)));
    let dir = tempfile::tempdir().unwrap();

    let outcome = fetcher
        .download_all("job-42", &DirectorySaveTarget::new(dir.path()))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        DownloadOutcome::Saved {
            path: dir.path().join("images.zip"),
            bytes: 7
        }
    );

    let failed = fetcher
        .download_all("missing", &DirectorySaveTarget::new(dir.path()))
        .await;
    assert!(matches!(
        failed,
        Err(CoreError::DownloadFailed { http_status: 500 })
    ));
}

#[tokio::test]
async fn test_health() {
    let addr = serve().await;
    assert!(backend(addr, ProtocolVariant::JobStatus)
        .health()
        .await
        .unwrap());
}

#[tokio::test]
async fn test_unreachable_backend_is_network_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let backend = backend(addr, ProtocolVariant::JobStatus);
    let result = backend.upload(&clip(), None, Arc::new(|_, _| {})).await;
    assert!(matches!(result, Err(CoreError::NetworkFailure { .. })));

    let status = backend.job_status("job-42").await;
    assert!(status.unwrap_err().is_recoverable());

    assert!(!backend.health().await.unwrap());
}
