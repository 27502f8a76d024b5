//! Upload → poll → fetch orchestration
//!
//! A [`SessionController`] runs one media item through the pipeline and
//! publishes a single [`ViewState`]. With the job-status protocol the job
//! is polled until terminal; with the direct protocol the returned bucket is
//! fetched straight away. A session runs once; retrying means a new session.
//!
//! [`cancel`](SessionController::cancel), or dropping the future returned by
//! [`run`](SessionController::run), tears everything down: the in-flight
//! request is dropped and the poller task is aborted, so no further backend
//! call is made.

use happyshot_core::{
    Album, AlbumFetcher, CapturedMedia, CoreError, CoreResult, DownloadOutcome, JobPoller,
    PollEvent, SaveTarget, UploadReceipt, UploadTransport,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ErrorKind, HappyShotError, HappyShotResult};
use crate::event::{ViewState, ViewStateStream};

type Observer = Box<dyn Fn(&ViewState) + Send + Sync>;

/// Forward-only holder of the current view state
struct StateCell {
    session_id: Uuid,
    sender: watch::Sender<ViewState>,
    observer: Mutex<Option<Observer>>,
}

impl StateCell {
    fn transition(&self, next: ViewState) -> bool {
        let mut applied = false;
        self.sender.send_if_modified(|current| {
            if current.can_transition_to(&next) {
                *current = next.clone();
                applied = true;
            }
            applied
        });

        if applied {
            debug!(session_id = %self.session_id, state = next.state_type(), "View state changed");
            if let Some(observer) = self.observer.lock().as_ref() {
                observer(&next);
            }
        }
        applied
    }
}

/// Drives one capture from upload to album
pub struct SessionController {
    id: Uuid,
    transport: UploadTransport,
    poller: JobPoller,
    fetcher: AlbumFetcher,
    state: Arc<StateCell>,
    cancel_tx: watch::Sender<bool>,
    started: AtomicBool,
}

impl SessionController {
    /// Create an idle session from its pipeline stages
    pub fn new(transport: UploadTransport, poller: JobPoller, fetcher: AlbumFetcher) -> Self {
        let id = Uuid::new_v4();
        let (sender, _) = watch::channel(ViewState::Idle);
        let (cancel_tx, _) = watch::channel(false);
        Self {
            id,
            transport,
            poller,
            fetcher,
            state: Arc::new(StateCell {
                session_id: id,
                sender,
                observer: Mutex::new(None),
            }),
            cancel_tx,
            started: AtomicBool::new(false),
        }
    }

    /// Call `observer` synchronously on every state change
    pub fn with_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&ViewState) + Send + Sync + 'static,
    {
        *self.state.observer.lock() = Some(Box::new(observer));
        self
    }

    /// Session id
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Current view state
    pub fn state(&self) -> ViewState {
        self.state.sender.borrow().clone()
    }

    /// Subscribe to view state changes
    pub fn subscribe(&self) -> ViewStateStream {
        ViewStateStream::new(self.state.sender.subscribe())
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Tear the session down; no backend call is made afterwards
    pub fn cancel(&self) {
        if !self.cancel_tx.send_replace(true) {
            info!(session_id = %self.id, "Session cancelled");
        }
    }

    /// Submit `media` and follow it until the album is ready.
    ///
    /// `bucket` is passed to the upload and, with the direct protocol, is
    /// the album id when the server does not return one.
    pub async fn run(&self, media: CapturedMedia, bucket: Option<&str>) -> HappyShotResult<Album> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(HappyShotError::SessionAlreadyStarted);
        }
        info!(
            session_id = %self.id,
            bytes = media.len(),
            mime = media.mime_type(),
            "Session started"
        );

        let mut cancelled = self.cancel_tx.subscribe();
        let outcome = tokio::select! {
            biased;
            _ = cancelled.wait_for(|c| *c) => Err(CoreError::Cancelled),
            result = self.pipeline(&media, bucket) => result,
        };

        match outcome {
            Ok(album) => {
                info!(session_id = %self.id, bucket_id = %album.bucket_id, images = album.len(), "Album ready");
                self.state.transition(ViewState::Ready {
                    album: album.clone(),
                });
                Ok(album)
            }
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Session failed");
                self.state.transition(ViewState::Error {
                    kind: ErrorKind::from(&e),
                    message: e.user_message(),
                });
                Err(e.into())
            }
        }
    }

    async fn pipeline(&self, media: &CapturedMedia, bucket: Option<&str>) -> CoreResult<Album> {
        self.state.transition(ViewState::Uploading { progress: 0.0 });

        let progress_state = self.state.clone();
        let receipt = self
            .transport
            .upload(media, bucket, move |progress| {
                progress_state.transition(ViewState::Uploading { progress });
            })
            .await?;

        let bucket_id = match receipt {
            UploadReceipt::Job(job) => {
                if !job.status.is_terminal() {
                    self.state.transition(ViewState::Waiting { status: job.status });
                }

                let poll_state = self.state.clone();
                let handle = self.poller.spawn(job, move |event| {
                    if let PollEvent::StatusChanged { to, .. } = event {
                        if !to.is_terminal() {
                            poll_state.transition(ViewState::Waiting { status: to });
                        }
                    }
                });
                handle.join().await?.job_id
            }
            UploadReceipt::Direct { bucket_id } => {
                debug!(session_id = %self.id, %bucket_id, "Direct upload, skipping status polling");
                bucket_id
            }
        };

        self.fetcher.fetch_album(&bucket_id).await
    }

    /// Download the finished album through `target`
    pub async fn download_all(&self, target: &dyn SaveTarget) -> HappyShotResult<DownloadOutcome> {
        let bucket_id = match self.state() {
            ViewState::Ready { album } => album.bucket_id,
            _ => return Err(HappyShotError::AlbumNotReady),
        };
        Ok(self.fetcher.download_all(&bucket_id, target).await?)
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.cancel_tx.send_replace(true);
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("id", &self.id)
            .field("state", &self.state().state_type())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
