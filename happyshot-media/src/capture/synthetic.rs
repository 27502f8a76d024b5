//! Software capture backend
//!
//! Generates gradient frames so the capture pipeline runs without camera
//! hardware. Denied permission, missing cameras, busy devices, slow opens
//! and camera warm-up can be switched at runtime, and the number of live
//! streams is tracked.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{
    CaptureBackend, CaptureDevice, DeviceKind, DeviceSelector, FacingMode, PlatformStream,
    StreamConstraints,
};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{Resolution, TrackState, VideoFrame, VideoTrack};

/// Camera exposed by [`SyntheticBackend`]
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    /// Enumerated device
    pub device: CaptureDevice,
    /// Largest resolution the camera delivers
    pub max_resolution: Resolution,
}

impl SyntheticCamera {
    /// Create a camera
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        facing: Option<FacingMode>,
        max_resolution: Resolution,
    ) -> Self {
        Self {
            device: CaptureDevice::camera(id, label, facing),
            max_resolution,
        }
    }
}

struct SyntheticState {
    cameras: Mutex<Vec<SyntheticCamera>>,
    permission_denied: AtomicBool,
    busy: Mutex<HashSet<String>>,
    open_delay: Mutex<Duration>,
    warmup: Mutex<Duration>,
    live: AtomicUsize,
    peak: AtomicUsize,
    opened: AtomicUsize,
    prompts: AtomicUsize,
    frames: AtomicUsize,
    next_track: AtomicU64,
}

/// In-process camera backend
#[derive(Clone)]
pub struct SyntheticBackend {
    state: Arc<SyntheticState>,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticBackend {
    /// Rear 1920x1080 camera and front 1280x720 camera
    pub fn new() -> Self {
        Self::with_cameras(vec![
            SyntheticCamera::new(
                "synthetic-back",
                "Back Camera",
                Some(FacingMode::Environment),
                Resolution::FULL_HD,
            ),
            SyntheticCamera::new(
                "synthetic-front",
                "Front Camera",
                Some(FacingMode::User),
                Resolution::HD,
            ),
        ])
    }

    /// Backend exposing exactly `cameras`
    pub fn with_cameras(cameras: Vec<SyntheticCamera>) -> Self {
        Self {
            state: Arc::new(SyntheticState {
                cameras: Mutex::new(cameras),
                permission_denied: AtomicBool::new(false),
                busy: Mutex::new(HashSet::new()),
                open_delay: Mutex::new(Duration::ZERO),
                warmup: Mutex::new(Duration::ZERO),
                live: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                opened: AtomicUsize::new(0),
                prompts: AtomicUsize::new(0),
                frames: AtomicUsize::new(0),
                next_track: AtomicU64::new(1),
            }),
        }
    }

    /// Replace the attached cameras
    pub fn set_cameras(&self, cameras: Vec<SyntheticCamera>) {
        *self.state.cameras.lock() = cameras;
    }

    /// Refuse (or allow) camera access
    pub fn set_permission_denied(&self, denied: bool) {
        self.state.permission_denied.store(denied, Ordering::SeqCst);
    }

    /// Mark a device as held by another application
    pub fn set_busy(&self, device_id: &str, busy: bool) {
        let mut set = self.state.busy.lock();
        if busy {
            set.insert(device_id.to_string());
        } else {
            set.remove(device_id);
        }
    }

    /// Time every open takes before the stream exists
    pub fn set_open_delay(&self, delay: Duration) {
        *self.state.open_delay.lock() = delay;
    }

    /// Time a stream takes to deliver its first frame
    pub fn set_warmup(&self, warmup: Duration) {
        *self.state.warmup.lock() = warmup;
    }

    /// Streams currently holding a camera
    pub fn live_streams(&self) -> usize {
        self.state.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously live streams
    pub fn peak_live_streams(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    /// Streams acquired so far, probes included
    pub fn open_count(&self) -> usize {
        self.state.opened.load(Ordering::SeqCst)
    }

    /// Permission prompts shown so far
    pub fn permission_prompts(&self) -> usize {
        self.state.prompts.load(Ordering::SeqCst)
    }

    /// Frames rendered so far
    pub fn frames_rendered(&self) -> usize {
        self.state.frames.load(Ordering::SeqCst)
    }

    fn select(&self, selector: &DeviceSelector) -> MediaResult<SyntheticCamera> {
        let cameras = self.state.cameras.lock();
        let found = match selector {
            DeviceSelector::Facing(mode) => cameras
                .iter()
                .find(|c| c.device.facing == Some(*mode))
                .or_else(|| cameras.first()),
            DeviceSelector::DeviceId(id) => cameras.iter().find(|c| &c.device.id == id),
        };
        found.cloned().ok_or_else(|| MediaError::StreamAcquisition {
            reason: format!("no camera satisfies {}", selector),
        })
    }

    fn start(&self, camera: SyntheticCamera, constraints: &StreamConstraints) -> SyntheticStream {
        let live = self.state.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(live, Ordering::SeqCst);
        self.state.opened.fetch_add(1, Ordering::SeqCst);

        let resolution = Resolution::new(
            camera.max_resolution.width.min(constraints.ideal.width),
            camera.max_resolution.height.min(constraints.ideal.height),
        );
        let track_id = format!(
            "track-{}",
            self.state.next_track.fetch_add(1, Ordering::SeqCst)
        );
        debug!(device_id = %camera.device.id, %resolution, live, "Synthetic stream started");

        SyntheticStream {
            device: camera.device,
            resolution,
            track_id,
            opened_at: Instant::now(),
            warmup: *self.state.warmup.lock(),
            stopped: AtomicBool::new(false),
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn request_permission(
        &self,
        constraints: &StreamConstraints,
    ) -> MediaResult<Box<dyn PlatformStream>> {
        self.state.prompts.fetch_add(1, Ordering::SeqCst);
        if self.state.permission_denied.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied {
                reason: "NotAllowedError".to_string(),
            });
        }
        let first = self.state.cameras.lock().first().cloned();
        let camera = first.ok_or(MediaError::NoDeviceFound)?;
        Ok(Box::new(self.start(camera, constraints)))
    }

    async fn enumerate_devices(&self) -> MediaResult<Vec<CaptureDevice>> {
        let mut devices: Vec<CaptureDevice> = self
            .state
            .cameras
            .lock()
            .iter()
            .map(|c| c.device.clone())
            .collect();
        devices.push(CaptureDevice {
            id: "synthetic-mic".to_string(),
            label: "Synthetic Microphone".to_string(),
            kind: DeviceKind::AudioInput,
            facing: None,
        });
        Ok(devices)
    }

    async fn open(
        &self,
        selector: &DeviceSelector,
        constraints: &StreamConstraints,
    ) -> MediaResult<Box<dyn PlatformStream>> {
        let delay = *self.state.open_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.state.permission_denied.load(Ordering::SeqCst) {
            return Err(MediaError::PermissionDenied {
                reason: "NotAllowedError".to_string(),
            });
        }
        let camera = self.select(selector)?;
        if self.state.busy.lock().contains(&camera.device.id) {
            return Err(MediaError::StreamAcquisition {
                reason: format!("{} is in use by another application", camera.device.label),
            });
        }
        Ok(Box::new(self.start(camera, constraints)))
    }
}

struct SyntheticStream {
    device: CaptureDevice,
    resolution: Resolution,
    track_id: String,
    opened_at: Instant,
    warmup: Duration,
    stopped: AtomicBool,
    state: Arc<SyntheticState>,
}

impl PlatformStream for SyntheticStream {
    fn device(&self) -> &CaptureDevice {
        &self.device
    }

    fn native_resolution(&self) -> Resolution {
        self.resolution
    }

    fn tracks(&self) -> Vec<VideoTrack> {
        let mut track = VideoTrack::new(self.track_id.clone(), self.device.label.clone());
        if self.stopped.load(Ordering::SeqCst) {
            track.state = TrackState::Ended;
        }
        vec![track]
    }

    fn latest_frame(&self) -> Option<VideoFrame> {
        if !self.has_frame() {
            return None;
        }
        self.state.frames.fetch_add(1, Ordering::SeqCst);
        let elapsed = self.opened_at.elapsed();
        Some(gradient_frame(self.resolution, elapsed.as_millis() as u64))
    }

    fn has_frame(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.opened_at.elapsed() >= self.warmup
    }

    fn stop_all(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            let live = self.state.live.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!(device_id = %self.device.id, live, "Synthetic stream stopped");
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn gradient_frame(resolution: Resolution, timestamp: u64) -> VideoFrame {
    let (width, height) = (resolution.width.max(1), resolution.height.max(1));
    let phase = (timestamp / 40 % 256) as u8;
    let mut data = Vec::with_capacity(VideoFrame::expected_len(width, height));
    for y in 0..height {
        for x in 0..width {
            data.push((x * 255 / width) as u8);
            data.push((y * 255 / height) as u8);
            data.push(phase);
        }
    }
    VideoFrame {
        width,
        height,
        data,
        timestamp,
    }
}
