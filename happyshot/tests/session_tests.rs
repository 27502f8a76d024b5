//! Session orchestration tests against a scripted backend
//!
//! All polling tests run on a paused clock; the default 2 s cadence elapses
//! instantly.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use futures::StreamExt;
use happyshot::*;
use happyshot_core::{ArchiveDownload, ByteProgress, CoreResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[derive(Debug, Clone)]
enum StatusReply {
    Status(JobStatus),
    FailedWith(&'static str),
    NetworkDown,
}

/// Backend recording every call in order
struct MockBackend {
    variant: ProtocolVariant,
    statuses: Mutex<VecDeque<StatusReply>>,
    fallback: StatusReply,
    reject_upload: bool,
    accepted: JobStatus,
    images: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            variant: ProtocolVariant::JobStatus,
            statuses: Mutex::new(VecDeque::new()),
            fallback: StatusReply::Status(JobStatus::Processing),
            reject_upload: false,
            accepted: JobStatus::Pending,
            images: vec![
                "http://cdn.local/b/1.jpg".to_string(),
                "http://cdn.local/b/2.jpg".to_string(),
            ],
            calls: Mutex::new(Vec::new()),
        }
    }

    fn with_statuses(self, replies: Vec<StatusReply>) -> Self {
        *self.statuses.lock() = replies.into();
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.starts_with(name)).count()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn upload(
        &self,
        media: &CapturedMedia,
        bucket: Option<&str>,
        progress: ByteProgress,
    ) -> CoreResult<UploadReceipt> {
        self.calls.lock().push("upload".to_string());
        let total = media.len() as u64;
        progress(total / 2, total);
        progress(total, total);

        if self.reject_upload {
            return Err(CoreError::UploadRejected {
                http_status: 400,
                message: "Invalid file type. Expected video.".to_string(),
            });
        }
        match self.variant {
            ProtocolVariant::JobStatus => {
                Ok(UploadReceipt::Job(Job::accepted("job-7", self.accepted)))
            }
            ProtocolVariant::Direct => Ok(UploadReceipt::Direct {
                bucket_id: bucket.unwrap_or("bucket-direct").to_string(),
            }),
        }
    }

    async fn job_status(&self, job_id: &str) -> CoreResult<Job> {
        self.calls.lock().push(format!("status:{}", job_id));
        let reply = self
            .statuses
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());
        match reply {
            StatusReply::Status(status) => Ok(Job::accepted(job_id, status)),
            StatusReply::FailedWith(reason) => {
                let mut job = Job::accepted(job_id, JobStatus::Failed);
                job.error = Some(reason.to_string());
                Ok(job)
            }
            StatusReply::NetworkDown => Err(CoreError::NetworkFailure {
                reason: "connection refused".to_string(),
            }),
        }
    }

    async fn list_images(&self, bucket_id: &str) -> CoreResult<Vec<String>> {
        self.calls.lock().push(format!("images:{}", bucket_id));
        Ok(self.images.clone())
    }

    async fn download_archive(&self, bucket_id: &str) -> CoreResult<ArchiveDownload> {
        self.calls.lock().push(format!("download:{}", bucket_id));
        let chunks: Vec<CoreResult<Bytes>> = vec![
            Ok(Bytes::from_static(b"PK\x03\x04")),
            Ok(Bytes::from_static(b"zipdata")),
        ];
        Ok(ArchiveDownload {
            suggested_name: Some("images.zip".to_string()),
            content_length: Some(11),
            body: stream::iter(chunks).boxed(),
        })
    }

    async fn health(&self) -> CoreResult<bool> {
        Ok(true)
    }

    fn variant(&self) -> ProtocolVariant {
        self.variant
    }
}

fn client(backend: &Arc<MockBackend>) -> HappyShot {
    client_with(ClientConfig::default(), backend)
}

fn client_with(config: ClientConfig, backend: &Arc<MockBackend>) -> HappyShot {
    let backend: Arc<dyn Backend> = backend.clone();
    HappyShot::with_backend(config, backend).unwrap()
}

fn video() -> CapturedMedia {
    CapturedMedia::new(vec![0u8; 4096], "video/mp4").with_file_name("party.mp4")
}

#[tokio::test(start_paused = true)]
async fn test_album_fetched_once_after_completion() {
    let backend = Arc::new(MockBackend::new().with_statuses(vec![
        StatusReply::Status(JobStatus::Processing),
        StatusReply::Status(JobStatus::Processing),
        StatusReply::Status(JobStatus::Processing),
        StatusReply::Status(JobStatus::Completed),
    ]));
    let session = client(&backend).session();

    let album = assert_ok!(session.run(video(), None).await);
    assert_eq!(album.bucket_id, "job-7");
    assert_eq!(album.len(), 2);

    let calls = backend.calls();
    assert_eq!(calls.first().map(String::as_str), Some("upload"));
    assert_eq!(backend.count("status:job-7"), 4);
    assert_eq!(backend.count("images:"), 1);
    assert_eq!(calls.last().map(String::as_str), Some("images:job-7"));

    match session.state() {
        ViewState::Ready { album } => assert_eq!(album.images.len(), 2),
        other => panic!("expected ready, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_surfaces_reason_and_stops_polling() {
    let backend = Arc::new(MockBackend::new().with_statuses(vec![
        StatusReply::Status(JobStatus::Processing),
        StatusReply::FailedWith("boom"),
    ]));
    let session = client(&backend).session();

    let err = assert_err!(session.run(video(), None).await);
    assert_eq!(err.kind(), ErrorKind::JobFailed);
    assert_eq!(
        session.state(),
        ViewState::Error {
            kind: ErrorKind::JobFailed,
            message: "boom".to_string(),
        }
    );

    let polled = backend.count("status:");
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(backend.count("status:"), polled);
    assert_eq!(backend.count("images:"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_empty_album_is_ready_not_error() {
    let mut mock = MockBackend::new().with_statuses(vec![StatusReply::Status(JobStatus::Completed)]);
    mock.images = Vec::new();
    let backend = Arc::new(mock);
    let session = client(&backend).session();

    let album = assert_ok!(session.run(video(), None).await);
    assert!(album.is_empty());
    assert!(session.state().is_empty_album());
}

#[tokio::test(start_paused = true)]
async fn test_observer_sees_monotonic_progress_and_forward_states() {
    let backend = Arc::new(MockBackend::new().with_statuses(vec![
        StatusReply::Status(JobStatus::Processing),
        StatusReply::Status(JobStatus::Pending),
        StatusReply::Status(JobStatus::Completed),
    ]));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let session = client(&backend)
        .session()
        .with_observer(move |state| sink.lock().push(state.clone()));

    assert_ok!(session.run(video(), None).await);

    let seen = seen.lock().clone();
    let progress: Vec<f32> = seen
        .iter()
        .filter_map(|s| match s {
            ViewState::Uploading { progress } => Some(*progress),
            _ => None,
        })
        .collect();
    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last().copied(), Some(100.0));
    assert_eq!(progress.iter().filter(|p| **p == 100.0).count(), 1);

    let statuses: Vec<JobStatus> = seen
        .iter()
        .filter_map(|s| match s {
            ViewState::Waiting { status } => Some(*status),
            _ => None,
        })
        .collect();
    // the backward "pending" answer never reaches the view
    assert_eq!(statuses, vec![JobStatus::Pending, JobStatus::Processing]);

    let types: Vec<&str> = seen.iter().map(|s| s.state_type()).collect();
    assert_eq!(types.first(), Some(&"uploading"));
    assert_eq!(types.last(), Some(&"ready"));
}

#[tokio::test(start_paused = true)]
async fn test_job_completed_at_upload_skips_waiting() {
    let mut mock = MockBackend::new();
    mock.accepted = JobStatus::Completed;
    let backend = Arc::new(mock);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let session = client(&backend)
        .session()
        .with_observer(move |state| sink.lock().push(state.clone()));

    assert_ok!(session.run(video(), None).await);

    let types: Vec<&str> = seen.lock().iter().map(|s| s.state_type()).collect();
    assert!(!types.contains(&"waiting"));
    assert_eq!(types.last(), Some(&"ready"));
    assert_eq!(backend.count("status:"), 0);
    assert_eq!(backend.count("images:job-7"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_polling_stops_backend_calls() {
    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(client(&backend).session());

    let runner = session.clone();
    let task = tokio::spawn(async move { runner.run(video(), None).await });

    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert_eq!(backend.count("status:"), 2);

    session.cancel();
    let result = task.await.unwrap();
    assert!(matches!(
        result,
        Err(HappyShotError::Core(CoreError::Cancelled))
    ));
    assert!(matches!(
        session.state(),
        ViewState::Error {
            kind: ErrorKind::Cancelled,
            ..
        }
    ));

    let calls = backend.calls().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.calls().len(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_dropping_run_future_aborts_polling() {
    let backend = Arc::new(MockBackend::new());
    let session = Arc::new(client(&backend).session());

    let runner = session.clone();
    let task = tokio::spawn(async move { runner.run(video(), None).await });

    tokio::time::sleep(Duration::from_millis(4_500)).await;
    task.abort();
    let _ = task.await;

    let calls = backend.calls().len();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.calls().len(), calls);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_run_makes_no_call() {
    let backend = Arc::new(MockBackend::new());
    let session = client(&backend).session();
    session.cancel();

    assert_err!(session.run(video(), None).await);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_direct_variant_skips_polling() {
    let mut mock = MockBackend::new();
    mock.variant = ProtocolVariant::Direct;
    let backend = Arc::new(mock);
    let session = client(&backend).session();

    let album = assert_ok!(session.run(video(), Some("party-2024")).await);
    assert_eq!(album.bucket_id, "party-2024");
    assert_eq!(backend.count("status:"), 0);
    assert_eq!(backend.calls(), vec!["upload", "images:party-2024"]);
}

#[tokio::test(start_paused = true)]
async fn test_session_runs_once() {
    let backend = Arc::new(
        MockBackend::new().with_statuses(vec![StatusReply::Status(JobStatus::Completed)]),
    );
    let session = client(&backend).session();

    assert_ok!(session.run(video(), None).await);
    let err = assert_err!(session.run(video(), None).await);
    assert!(matches!(err, HappyShotError::SessionAlreadyStarted));
    assert_eq!(backend.count("upload"), 1);
    assert_eq!(session.state().state_type(), "ready");
}

#[tokio::test(start_paused = true)]
async fn test_upload_rejection_is_error_state() {
    let mut mock = MockBackend::new();
    mock.reject_upload = true;
    let backend = Arc::new(mock);
    let session = client(&backend).session();

    let err = assert_err!(session.run(video(), None).await);
    assert_eq!(err.kind(), ErrorKind::UploadRejected);
    match session.state() {
        ViewState::Error { kind, message } => {
            assert_eq!(kind, ErrorKind::UploadRejected);
            assert!(message.contains("Invalid file type"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    assert_eq!(backend.count("status:"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_media_never_uploads() {
    let backend = Arc::new(MockBackend::new());
    let session = client(&backend).session();

    let media = CapturedMedia::new(&b"%PDF-1.7"[..], "application/pdf");
    let err = assert_err!(session.run(media, None).await);
    assert_eq!(err.kind(), ErrorKind::UploadRejected);
    assert!(backend.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_polling_exhausted_after_consecutive_misses() {
    let mut mock = MockBackend::new();
    mock.fallback = StatusReply::NetworkDown;
    let backend = Arc::new(mock);
    let config = ClientConfig {
        max_consecutive_misses: Some(3),
        ..ClientConfig::default()
    };
    let session = client_with(config, &backend).session();

    let err = assert_err!(session.run(video(), None).await);
    assert_eq!(err.kind(), ErrorKind::PollingExhausted);
    assert_eq!(backend.count("status:"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_transient_misses_recover() {
    let backend = Arc::new(MockBackend::new().with_statuses(vec![
        StatusReply::NetworkDown,
        StatusReply::NetworkDown,
        StatusReply::Status(JobStatus::Completed),
    ]));
    let session = client(&backend).session();

    assert_ok!(session.run(video(), None).await);
    assert_eq!(backend.count("status:"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_subscriber_reaches_terminal_state() {
    let backend = Arc::new(
        MockBackend::new().with_statuses(vec![StatusReply::Status(JobStatus::Completed)]),
    );
    let session = client(&backend).session();
    let mut states = session.subscribe();
    assert_eq!(states.current(), ViewState::Idle);

    let (result, terminal) = tokio::join!(session.run(video(), None), states.terminal());
    assert_ok!(result);
    assert_eq!(terminal.map(|s| s.state_type()), Some("ready"));
}

#[tokio::test(start_paused = true)]
async fn test_download_requires_ready_album() {
    let backend = Arc::new(
        MockBackend::new().with_statuses(vec![StatusReply::Status(JobStatus::Completed)]),
    );
    let session = client(&backend).session();
    let dir = tempfile::tempdir().unwrap();
    let target = DirectorySaveTarget::new(dir.path());

    let err = assert_err!(session.download_all(&target).await);
    assert!(matches!(err, HappyShotError::AlbumNotReady));

    assert_ok!(session.run(video(), None).await);
    let outcome = assert_ok!(session.download_all(&target).await);
    assert_eq!(
        outcome,
        DownloadOutcome::Saved {
            path: dir.path().join("images.zip"),
            bytes: 11,
        }
    );
    assert_eq!(backend.count("download:job-7"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_snapshot_upload_end_to_end() {
    let backend = Arc::new(
        MockBackend::new().with_statuses(vec![StatusReply::Status(JobStatus::Completed)]),
    );
    let client = client(&backend);
    assert!(assert_ok!(client.health().await));

    let camera = client.camera(Arc::new(SyntheticBackend::new()));
    assert_eq!(camera.facing(), FacingMode::Environment);
    let view = assert_ok!(camera.open_stream(DeviceSelector::Facing(camera.facing())).await);

    let snapshot = assert_ok!(assert_ok!(client.snapshot_extractor()).capture(&view).await);
    assert_eq!(snapshot.mime_type(), "image/jpeg");
    camera.close();

    let album = assert_ok!(client.session().run(snapshot, None).await);
    assert_eq!(album.len(), 2);
}

#[test]
fn test_invalid_config_rejected() {
    let backend = Arc::new(MockBackend::new());
    let config = ClientConfig {
        poll_interval_ms: 0,
        ..ClientConfig::default()
    };
    let backend: Arc<dyn Backend> = backend;
    let err = HappyShot::with_backend(config, backend).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}
