//! Facade error type and the error kinds shown in the view state

use happyshot_core::CoreError;
use happyshot_media::MediaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned by the HappyShot facade
#[derive(Error, Debug)]
pub enum HappyShotError {
    /// Upload, polling or album failure
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Camera or snapshot failure
    #[error(transparent)]
    Media(#[from] MediaError),

    /// A session was run a second time; start a new one instead
    #[error("Session already started")]
    SessionAlreadyStarted,

    /// The album is not available yet
    #[error("Album not ready")]
    AlbumNotReady,
}

/// Result type alias for facade operations
pub type HappyShotResult<T> = Result<T, HappyShotError>;

impl HappyShotError {
    /// Kind shown in the view state
    pub fn kind(&self) -> ErrorKind {
        match self {
            HappyShotError::Core(e) => ErrorKind::from(e),
            HappyShotError::Media(e) => ErrorKind::from(e),
            HappyShotError::SessionAlreadyStarted | HappyShotError::AlbumNotReady => {
                ErrorKind::InvalidState
            }
        }
    }

    /// Message suitable for showing to the user as-is
    pub fn user_message(&self) -> String {
        match self {
            HappyShotError::Core(e) => e.user_message(),
            HappyShotError::Media(e) => e.user_message(),
            HappyShotError::SessionAlreadyStarted => {
                "This upload already ran. Start a new one to try again.".to_string()
            }
            HappyShotError::AlbumNotReady => "The album is not ready yet.".to_string(),
        }
    }
}

/// Failure classes the UI distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Camera access refused
    PermissionDenied,
    /// No camera attached
    NoDeviceFound,
    /// Camera could not be started
    StreamAcquisition,
    /// Camera has not produced a frame yet
    NoFrameAvailable,
    /// Media refused before or during upload
    UploadRejected,
    /// Server unreachable
    NetworkFailure,
    /// Archive download failed
    DownloadFailed,
    /// Backend reported processing failure
    JobFailed,
    /// Server stopped answering status requests
    PollingExhausted,
    /// Server answered something unexpected
    InvalidResponse,
    /// Session was torn down
    Cancelled,
    /// Misuse of the API
    InvalidState,
    /// Local failure (configuration, I/O, encoding)
    Internal,
}

impl From<&CoreError> for ErrorKind {
    fn from(error: &CoreError) -> Self {
        match error {
            CoreError::UploadRejected { .. } | CoreError::UnsupportedMedia { .. } => {
                ErrorKind::UploadRejected
            }
            CoreError::NetworkFailure { .. } | CoreError::Timeout { .. } => {
                ErrorKind::NetworkFailure
            }
            CoreError::DownloadFailed { .. } => ErrorKind::DownloadFailed,
            CoreError::JobFailed { .. } => ErrorKind::JobFailed,
            CoreError::PollingExhausted { .. } => ErrorKind::PollingExhausted,
            CoreError::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            CoreError::Cancelled => ErrorKind::Cancelled,
            CoreError::UploadInFlight => ErrorKind::InvalidState,
            CoreError::InvalidConfiguration { .. } | CoreError::Io { .. } => ErrorKind::Internal,
        }
    }
}

impl From<&MediaError> for ErrorKind {
    fn from(error: &MediaError) -> Self {
        match error {
            MediaError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            MediaError::NoDeviceFound => ErrorKind::NoDeviceFound,
            MediaError::StreamAcquisition { .. }
            | MediaError::SwitchSuperseded
            | MediaError::StreamClosed => ErrorKind::StreamAcquisition,
            MediaError::NoFrameAvailable => ErrorKind::NoFrameAvailable,
            MediaError::InvalidFrameData { .. }
            | MediaError::EncodingFailed { .. }
            | MediaError::InvalidConfiguration { .. } => ErrorKind::Internal,
        }
    }
}
