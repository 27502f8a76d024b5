//! Camera and snapshot error types
//!
//! Every variant that reaches the UI carries a message the user can act on;
//! see [`MediaError::user_message`].

use thiserror::Error;

/// Main error type for capture operations
#[derive(Error, Debug)]
pub enum MediaError {
    /// The user or the platform refused camera access
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Reason reported by the platform
        reason: String,
    },

    /// Permission was granted but no camera is attached
    #[error("No capture device found")]
    NoDeviceFound,

    /// Opening a stream failed (revoked permission, busy device, unsatisfiable constraint)
    #[error("Stream acquisition failed: {reason}")]
    StreamAcquisition {
        /// Failure reason
        reason: String,
    },

    /// A newer open request replaced this one before it finished
    #[error("Stream switch superseded by a newer request")]
    SwitchSuperseded,

    /// The stream has not produced a frame yet
    #[error("No frame available")]
    NoFrameAvailable,

    /// The stream was closed
    #[error("Stream closed")]
    StreamClosed,

    /// Frame buffer does not match its dimensions
    #[error("Invalid frame data: expected {expected} bytes, got {actual}")]
    InvalidFrameData {
        /// Expected data size
        expected: usize,
        /// Actual data size
        actual: usize,
    },

    /// Encoding operation failed
    #[error("Encoding failed: {codec} - {reason}")]
    EncodingFailed {
        /// Codec name
        codec: String,
        /// Failure reason
        reason: String,
    },

    /// Invalid configuration provided
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// Error message
        message: String,
    },
}

/// Result type alias for media operations
pub type MediaResult<T> = Result<T, MediaError>;

impl MediaError {
    /// Check if error is recoverable by trying again
    pub fn is_recoverable(&self) -> bool {
        match self {
            MediaError::StreamAcquisition { .. } => true,
            MediaError::NoFrameAvailable => true,
            MediaError::SwitchSuperseded => true,
            MediaError::PermissionDenied { .. } => false,
            MediaError::NoDeviceFound => false,
            _ => false,
        }
    }

    /// Get error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            MediaError::PermissionDenied { .. } => ErrorCategory::Permission,
            MediaError::NoDeviceFound => ErrorCategory::Device,
            MediaError::StreamAcquisition { .. } => ErrorCategory::Device,
            MediaError::SwitchSuperseded => ErrorCategory::State,
            MediaError::NoFrameAvailable => ErrorCategory::State,
            MediaError::StreamClosed => ErrorCategory::State,
            MediaError::InvalidFrameData { .. } => ErrorCategory::Data,
            MediaError::EncodingFailed { .. } => ErrorCategory::Codec,
            MediaError::InvalidConfiguration { .. } => ErrorCategory::Configuration,
        }
    }

    /// Message suitable for showing to the user as-is
    pub fn user_message(&self) -> String {
        match self {
            MediaError::PermissionDenied { .. } => {
                "Camera access was denied. Allow camera access in your settings and try again."
                    .to_string()
            }
            MediaError::NoDeviceFound => {
                "No camera was found. Connect a camera and try again.".to_string()
            }
            MediaError::StreamAcquisition { reason } => {
                format!("Could not start the camera: {}", reason)
            }
            MediaError::SwitchSuperseded => "The camera is switching.".to_string(),
            MediaError::NoFrameAvailable => "The camera is still starting up.".to_string(),
            MediaError::StreamClosed => "The camera was turned off.".to_string(),
            MediaError::InvalidFrameData { .. } | MediaError::EncodingFailed { .. } => {
                "The photo could not be saved.".to_string()
            }
            MediaError::InvalidConfiguration { message } => {
                format!("The camera is misconfigured: {}", message)
            }
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Access refused
    Permission,
    /// Device and hardware errors
    Device,
    /// State management errors
    State,
    /// Data validation errors
    Data,
    /// Codec-related errors
    Codec,
    /// Configuration and parameter errors
    Configuration,
}
