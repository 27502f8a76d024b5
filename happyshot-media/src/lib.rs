//! # HappyShot Media
//!
//! Live camera capture for HappyShot: device enumeration, single-owner
//! stream lifecycle with serialized switching, still snapshots encoded as
//! JPEG, and a self-timer. Platforms plug in through
//! [`capture::CaptureBackend`].

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod capture;
pub mod error;
pub mod snapshot;
pub mod stream_manager;
pub mod timer;
pub mod tracks;

// Re-export main types
pub use capture::synthetic::{SyntheticBackend, SyntheticCamera};
pub use capture::{
    CaptureBackend, CaptureDevice, DeviceKind, DeviceSelector, FacingMode, FacingModeParseError,
    PlatformStream, StreamConstraints,
};
pub use error::{ErrorCategory, MediaError, MediaResult};
pub use snapshot::{SnapshotExtractor, DEFAULT_JPEG_QUALITY, SNAPSHOT_MIME_TYPE};
pub use stream_manager::{MediaEvent, MediaStreamManager, StreamView};
pub use timer::CaptureTimer;
pub use tracks::{Resolution, TrackState, VideoFrame, VideoTrack};
