//! Still capture from a live stream
//!
//! The current frame is drawn onto an off-screen RGB surface at the
//! stream's native resolution, never a display size, and encoded as JPEG.
//! Encoding is CPU-bound and runs on the blocking pool.

use chrono::Utc;
use happyshot_core::CapturedMedia;
use image::RgbImage;
use tracing::{debug, info};

use crate::error::{MediaError, MediaResult};
use crate::stream_manager::StreamView;
use crate::tracks::VideoFrame;

/// JPEG quality used for snapshots
pub const DEFAULT_JPEG_QUALITY: u8 = 92;

/// Mime type of encoded snapshots
pub const SNAPSHOT_MIME_TYPE: &str = "image/jpeg";

/// Encodes the current frame of a stream
#[derive(Debug, Clone, Copy)]
pub struct SnapshotExtractor {
    quality: u8,
}

impl Default for SnapshotExtractor {
    fn default() -> Self {
        Self {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl SnapshotExtractor {
    /// Create an extractor with a fixed JPEG quality (1-100)
    pub fn new(quality: u8) -> MediaResult<Self> {
        if !(1..=100).contains(&quality) {
            return Err(MediaError::InvalidConfiguration {
                message: format!("JPEG quality must be within 1..=100, got {}", quality),
            });
        }
        Ok(Self { quality })
    }

    /// JPEG quality in use
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Whether the stream has produced a frame yet
    pub fn has_frame(&self, stream: &StreamView) -> bool {
        stream.has_frame()
    }

    /// Encode the frame the stream is presenting now
    pub async fn capture(&self, stream: &StreamView) -> MediaResult<CapturedMedia> {
        let frame = stream.latest_frame()?;
        frame.validate()?;

        let (width, height) = (frame.width, frame.height);
        let quality = self.quality;
        debug!(width, height, quality, "Encoding snapshot");

        let data = tokio::task::spawn_blocking(move || encode_jpeg(frame, quality))
            .await
            .map_err(|e| MediaError::EncodingFailed {
                codec: "jpeg".to_string(),
                reason: format!("encoding task error: {}", e),
            })??;

        let name = format!("snapshot-{}.jpg", Utc::now().format("%Y%m%d-%H%M%S%3f"));
        info!(width, height, size = data.len(), device_id = %stream.device().id, "Snapshot captured");
        Ok(CapturedMedia::new(data, SNAPSHOT_MIME_TYPE).with_file_name(name))
    }
}

fn encode_jpeg(frame: VideoFrame, quality: u8) -> MediaResult<Vec<u8>> {
    let expected = VideoFrame::expected_len(frame.width, frame.height);
    let actual = frame.data.len();
    let surface = RgbImage::from_raw(frame.width, frame.height, frame.data)
        .ok_or(MediaError::InvalidFrameData { expected, actual })?;

    let mut buffer = Vec::with_capacity(expected / 8);
    let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    encoder
        .encode(
            surface.as_raw(),
            surface.width(),
            surface.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| MediaError::EncodingFailed {
            codec: "jpeg".to_string(),
            reason: e.to_string(),
        })?;
    Ok(buffer)
}
