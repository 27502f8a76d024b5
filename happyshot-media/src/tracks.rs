//! Track abstractions and raw frame types

use crate::error::{MediaError, MediaResult};

/// Raw RGB24 video frame at the stream's native resolution
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Packed RGB24 pixel data, row-major
    pub data: Vec<u8>,
    /// Timestamp in milliseconds since the stream opened
    pub timestamp: u64,
}

impl VideoFrame {
    /// Byte length a frame of these dimensions must have
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Check that the buffer matches the dimensions
    pub fn validate(&self) -> MediaResult<()> {
        let expected = Self::expected_len(self.width, self.height);
        if self.data.len() != expected || expected == 0 {
            return Err(MediaError::InvalidFrameData {
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

/// Native resolution of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Resolution {
    /// Create a resolution
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// 1280x720
    pub const HD: Self = Self::new(1280, 720);
    /// 1920x1080
    pub const FULL_HD: Self = Self::new(1920, 1080);
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Lifecycle of a single track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// Producing frames
    Live,
    /// Stopped; the hardware is released
    Ended,
}

/// Video track of a platform stream
#[derive(Debug, Clone)]
pub struct VideoTrack {
    /// Track ID
    pub id: String,
    /// Label of the source device
    pub label: String,
    /// Current state
    pub state: TrackState,
}

impl VideoTrack {
    /// Create a live track
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            state: TrackState::Live,
        }
    }

    /// Get track ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the track still holds the device
    pub fn is_live(&self) -> bool {
        self.state == TrackState::Live
    }
}
