//! Platform capture seam
//!
//! [`CaptureBackend`] is what the platform provides: permission prompts,
//! device enumeration and stream acquisition. [`PlatformStream`] is one
//! acquired hardware stream. Platforms plug in their own implementation;
//! [`synthetic::SyntheticBackend`] generates frames in software.

pub mod synthetic;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MediaResult;
use crate::tracks::{Resolution, VideoFrame, VideoTrack};

/// Which way a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Rear camera
    #[default]
    Environment,
    /// Front camera
    User,
}

/// Unknown facing mode string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown facing mode: {0}")]
pub struct FacingModeParseError(pub String);

impl FacingMode {
    /// The opposite facing
    pub fn flipped(self) -> Self {
        match self {
            FacingMode::Environment => FacingMode::User,
            FacingMode::User => FacingMode::Environment,
        }
    }

    /// Constraint string
    pub fn as_str(&self) -> &'static str {
        match self {
            FacingMode::Environment => "environment",
            FacingMode::User => "user",
        }
    }
}

impl fmt::Display for FacingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacingMode {
    type Err = FacingModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "environment" | "back" | "rear" => Ok(FacingMode::Environment),
            "user" | "front" => Ok(FacingMode::User),
            other => Err(FacingModeParseError(other.to_string())),
        }
    }
}

/// Kind of a media device reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Camera
    VideoInput,
    /// Microphone
    AudioInput,
    /// Speaker
    AudioOutput,
}

/// Device as enumerated by the platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Platform device id
    pub id: String,
    /// Human-readable label
    pub label: String,
    /// Device kind
    pub kind: DeviceKind,
    /// Facing, when the platform reports it
    pub facing: Option<FacingMode>,
}

impl CaptureDevice {
    /// A camera device
    pub fn camera(
        id: impl Into<String>,
        label: impl Into<String>,
        facing: Option<FacingMode>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind: DeviceKind::VideoInput,
            facing,
        }
    }
}

/// Which camera to open
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSelector {
    /// Any camera with this facing, preferred not required
    Facing(FacingMode),
    /// Exactly this device
    DeviceId(String),
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelector::Facing(mode) => write!(f, "facing:{}", mode),
            DeviceSelector::DeviceId(id) => write!(f, "device:{}", id),
        }
    }
}

/// Constraints for stream acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    /// Preferred resolution; the device may deliver something else
    pub ideal: Resolution,
    /// Request an audio track too
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal: Resolution::FULL_HD,
            audio: false,
        }
    }
}

/// One acquired hardware stream
pub trait PlatformStream: Send + Sync {
    /// Device the stream was opened on
    fn device(&self) -> &CaptureDevice;
    /// Resolution frames are delivered at
    fn native_resolution(&self) -> Resolution;
    /// Snapshot of the stream's tracks
    fn tracks(&self) -> Vec<VideoTrack>;
    /// Most recent frame, `None` until the first one arrives or after stop
    fn latest_frame(&self) -> Option<VideoFrame>;
    /// Whether [`latest_frame`](Self::latest_frame) would return a frame,
    /// without copying one out
    fn has_frame(&self) -> bool;
    /// Stop every track and release the device; idempotent
    fn stop_all(&self);
}

/// Platform capture backend
#[async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Prompt for camera access by acquiring a probe stream.
    ///
    /// The caller stops the probe right away; device labels are only
    /// reported once access was granted.
    async fn request_permission(
        &self,
        constraints: &StreamConstraints,
    ) -> MediaResult<Box<dyn PlatformStream>>;

    /// All media devices in platform order
    async fn enumerate_devices(&self) -> MediaResult<Vec<CaptureDevice>>;

    /// Acquire a stream
    async fn open(
        &self,
        selector: &DeviceSelector,
        constraints: &StreamConstraints,
    ) -> MediaResult<Box<dyn PlatformStream>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_parse_and_flip() {
        assert_eq!("environment".parse::<FacingMode>(), Ok(FacingMode::Environment));
        assert_eq!(" Front ".parse::<FacingMode>(), Ok(FacingMode::User));
        assert!("sideways".parse::<FacingMode>().is_err());
        assert_eq!(FacingMode::User.flipped(), FacingMode::Environment);
    }

    #[test]
    fn test_default_constraints() {
        let constraints = StreamConstraints::default();
        assert_eq!(constraints.ideal, Resolution::new(1920, 1080));
        assert!(!constraints.audio);
    }
}
