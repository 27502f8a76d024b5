//! # HappyShot
//!
//! Client core for the HappyShot service: capture a photo (or pick a video),
//! upload it to the processing backend, follow the processing job, and
//! retrieve the resulting album for display and bulk download.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use happyshot::{CapturedMedia, ClientConfig, HappyShot};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     happyshot::init_logging(false);
//!
//!     let client = HappyShot::new(ClientConfig::from_env()?)?;
//!     let session = client.session();
//!
//!     let mut states = session.subscribe();
//!     tokio::spawn(async move {
//!         while let Some(state) = states.next().await {
//!             println!("{}", state.state_type());
//!         }
//!     });
//!
//!     let media = CapturedMedia::from_file("party.mp4").await?;
//!     let album = session.run(media, None).await?;
//!     println!("{} images", album.len());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;
use tracing::info;

// Re-export core types for easy access
pub use happyshot_core::{
    Album, AlbumFetcher, Backend, CapturedMedia, CoreError, DirectorySaveTarget, DownloadOutcome,
    HttpBackend, Job, JobPoller, JobStatus, PollPolicy, ProtocolVariant, SaveTarget,
    UploadReceipt, UploadTransport,
};
pub use happyshot_media::{
    CaptureBackend, CaptureDevice, CaptureTimer, DeviceSelector, FacingMode, MediaError,
    MediaEvent, MediaStreamManager, SnapshotExtractor, StreamConstraints, StreamView,
    SyntheticBackend,
};

// Public API modules
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod session;

// Re-export main API types
pub use config::ClientConfig;
pub use error::{ErrorKind, HappyShotError, HappyShotResult};
pub use event::{ViewState, ViewStateStream};
pub use logging::init_logging;
pub use session::SessionController;

/// Main entry point for HappyShot
#[derive(Clone)]
pub struct HappyShot {
    inner: Arc<HappyShotInner>,
}

struct HappyShotInner {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
}

impl HappyShot {
    /// Connect to the backend described by `config`
    ///
    /// # Example
    /// ```rust,no_run
    /// use happyshot::{ClientConfig, HappyShot};
    ///
    /// let client = HappyShot::new(ClientConfig::default())?;
    /// # Ok::<(), happyshot::HappyShotError>(())
    /// ```
    pub fn new(config: ClientConfig) -> HappyShotResult<Self> {
        config.validate()?;
        let backend = HttpBackend::new(config.http_backend_config())?;
        Self::with_backend(config, Arc::new(backend))
    }

    /// Use a custom backend implementation
    pub fn with_backend(config: ClientConfig, backend: Arc<dyn Backend>) -> HappyShotResult<Self> {
        config.validate()?;
        if config.debug_logging {
            init_logging(true);
        }
        info!(
            base_url = %config.base_url,
            protocol = ?backend.variant(),
            poll_interval_ms = config.poll_interval_ms,
            "HappyShot client ready"
        );
        Ok(Self {
            inner: Arc::new(HappyShotInner { config, backend }),
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Start a new upload-to-album session
    pub fn session(&self) -> SessionController {
        let backend = self.inner.backend.clone();
        SessionController::new(
            UploadTransport::new(
                backend.clone(),
                self.inner.config.allowed_mime_prefixes.clone(),
            ),
            JobPoller::new(backend.clone(), self.inner.config.poll_policy()),
            AlbumFetcher::new(backend),
        )
    }

    /// Album access outside a session (shared links)
    pub fn album_fetcher(&self) -> AlbumFetcher {
        AlbumFetcher::new(self.inner.backend.clone())
    }

    /// Camera manager on `capture`, opening with the configured facing
    pub fn camera(&self, capture: Arc<dyn CaptureBackend>) -> MediaStreamManager {
        MediaStreamManager::with_constraints(
            capture,
            StreamConstraints::default(),
            self.inner.config.default_facing,
        )
    }

    /// Snapshot encoder with the configured JPEG quality
    pub fn snapshot_extractor(&self) -> HappyShotResult<SnapshotExtractor> {
        Ok(SnapshotExtractor::new(self.inner.config.jpeg_quality)?)
    }

    /// Self-timer for snapshot capture
    pub fn capture_timer(&self) -> CaptureTimer {
        CaptureTimer::new()
    }

    /// Whether the backend answers its health check
    pub async fn health(&self) -> HappyShotResult<bool> {
        Ok(self.inner.backend.health().await?)
    }
}

impl std::fmt::Debug for HappyShot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HappyShot")
            .field("config", &self.inner.config)
            .finish()
    }
}
