//! Error types for the HappyShot pipeline

use std::time::Duration;
use thiserror::Error;

/// Fallback shown when a job fails without a reason from the backend
pub const GENERIC_JOB_FAILURE: &str = "processing failed";

/// Main error type for upload, polling and album operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backend answered the upload with a non-2xx status
    #[error("Upload rejected with HTTP {http_status}: {message}")]
    UploadRejected {
        /// HTTP status code returned by the backend
        http_status: u16,
        /// Message extracted from the error body, if any
        message: String,
    },

    /// No response was received (connection refused, reset, timed out)
    #[error("Network failure: {reason}")]
    NetworkFailure {
        /// Reason for the failure
        reason: String,
    },

    /// Archive download answered with a non-2xx status
    #[error("Download failed with HTTP {http_status}")]
    DownloadFailed {
        /// HTTP status code returned by the backend
        http_status: u16,
    },

    /// Backend reported the job as failed
    #[error("Job failed: {reason}")]
    JobFailed {
        /// Reason reported by the backend, or the generic fallback
        reason: String,
    },

    /// Media rejected before it was sent
    #[error("Unsupported media: {reason}")]
    UnsupportedMedia {
        /// Why the media was rejected
        reason: String,
    },

    /// A second upload was started while one is still in flight
    #[error("An upload is already in progress")]
    UploadInFlight,

    /// Polling gave up after too many consecutive transient misses
    #[error("Job status unavailable after {attempts} consecutive attempts")]
    PollingExhausted {
        /// Number of consecutive failed polls
        attempts: u32,
    },

    /// Backend answered with a body that does not match the protocol
    #[error("Invalid response: {reason}")]
    InvalidResponse {
        /// What was wrong with the body
        reason: String,
    },

    /// Configuration rejected
    #[error("Invalid configuration: {field} - {reason}")]
    InvalidConfiguration {
        /// Offending field
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// The operation was torn down before it finished
    #[error("Operation cancelled")]
    Cancelled,

    /// Request timed out
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// Configured timeout
        duration: Duration,
    },

    /// Local I/O failed while saving a download
    #[error("I/O error: {source}")]
    Io {
        /// Underlying error
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for pipeline operations
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Check if retrying the same request may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::NetworkFailure { .. } | CoreError::Timeout { .. } | CoreError::Io { .. }
        )
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            CoreError::UploadRejected { .. } => ErrorCategory::Upload,
            CoreError::UnsupportedMedia { .. } => ErrorCategory::Upload,
            CoreError::UploadInFlight => ErrorCategory::State,
            CoreError::NetworkFailure { .. } => ErrorCategory::Network,
            CoreError::Timeout { .. } => ErrorCategory::Network,
            CoreError::DownloadFailed { .. } => ErrorCategory::Download,
            CoreError::JobFailed { .. } => ErrorCategory::Job,
            CoreError::PollingExhausted { .. } => ErrorCategory::Job,
            CoreError::InvalidResponse { .. } => ErrorCategory::Protocol,
            CoreError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
            CoreError::Cancelled => ErrorCategory::State,
            CoreError::Io { .. } => ErrorCategory::System,
        }
    }

    /// Message suitable for showing to the user as-is
    pub fn user_message(&self) -> String {
        match self {
            CoreError::UploadRejected { http_status, message } if message.is_empty() => {
                format!("The upload was rejected by the server (HTTP {}).", http_status)
            }
            CoreError::UploadRejected { message, .. } => {
                format!("The upload was rejected by the server: {}", message)
            }
            CoreError::NetworkFailure { .. } | CoreError::Timeout { .. } => {
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            CoreError::DownloadFailed { http_status } => {
                format!("The download failed (HTTP {}).", http_status)
            }
            CoreError::JobFailed { reason } => reason.clone(),
            CoreError::UnsupportedMedia { reason } => reason.clone(),
            CoreError::UploadInFlight => "An upload is already in progress.".to_string(),
            CoreError::PollingExhausted { .. } => {
                "The server stopped responding while processing. Please try again.".to_string()
            }
            CoreError::InvalidResponse { .. } => {
                "The server sent an unexpected response.".to_string()
            }
            CoreError::InvalidConfiguration { field, .. } => {
                format!("The client is misconfigured ({}).", field)
            }
            CoreError::Cancelled => "The operation was cancelled.".to_string(),
            CoreError::Io { source } => format!("Could not save the file: {}", source),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::NetworkFailure {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidResponse {
            reason: err.to_string(),
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Upload was refused or invalid
    Upload,
    /// Transport-level failures
    Network,
    /// Archive download failures
    Download,
    /// Backend job failures
    Job,
    /// Unexpected wire data
    Protocol,
    /// Configuration errors
    Configuration,
    /// Misuse or teardown
    State,
    /// Local system errors
    System,
}
