//! Live camera stream ownership
//!
//! [`MediaStreamManager`] is the single owner of the hardware stream. At most
//! one stream is open per manager at any instant:
//!
//! - the active stream is stopped before a new one is requested;
//! - opens are serialized, and every open is tagged with a generation. A
//!   newer open or a [`close`](MediaStreamManager::close) supersedes an
//!   in-flight one, which drops its pending acquisition (or stops the stream
//!   it just got) and fails with [`MediaError::SwitchSuperseded`];
//! - dropping the manager stops the active stream.
//!
//! Consumers get a [`StreamView`], a non-owning handle that reads frames but
//! cannot keep the camera alive.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::capture::{
    CaptureBackend, CaptureDevice, DeviceKind, DeviceSelector, FacingMode, PlatformStream,
    StreamConstraints,
};
use crate::error::{MediaError, MediaResult};
use crate::tracks::{Resolution, VideoFrame, VideoTrack};

/// Camera lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Device list refreshed
    DevicesChanged {
        /// Number of cameras
        count: usize,
    },
    /// A stream became active
    StreamOpened {
        /// Device the stream runs on
        device_id: String,
        /// Native resolution
        resolution: Resolution,
    },
    /// The active stream was stopped
    StreamClosed {
        /// Device the stream ran on
        device_id: String,
    },
    /// Permission, enumeration or acquisition failed
    StreamError {
        /// User-facing message
        message: String,
    },
}

/// Owned platform stream; stops every track when dropped
struct LiveStream {
    stream: Arc<dyn PlatformStream>,
}

impl LiveStream {
    fn new(stream: Box<dyn PlatformStream>) -> Self {
        Self {
            stream: Arc::from(stream),
        }
    }

    fn view(&self) -> StreamView {
        StreamView {
            device: self.stream.device().clone(),
            resolution: self.stream.native_resolution(),
            stream: Arc::downgrade(&self.stream),
        }
    }

    fn device_id(&self) -> &str {
        &self.stream.device().id
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.stream.stop_all();
    }
}

/// Non-owning handle to a live stream
#[derive(Clone)]
pub struct StreamView {
    device: CaptureDevice,
    resolution: Resolution,
    stream: Weak<dyn PlatformStream>,
}

impl StreamView {
    /// Device the stream runs on
    pub fn device(&self) -> &CaptureDevice {
        &self.device
    }

    /// Native resolution of the stream
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Whether the stream is still open
    pub fn is_open(&self) -> bool {
        self.stream
            .upgrade()
            .map_or(false, |s| s.tracks().iter().any(VideoTrack::is_live))
    }

    /// Whether the stream has a frame to hand out
    pub fn has_frame(&self) -> bool {
        self.stream.upgrade().map_or(false, |s| s.has_frame())
    }

    /// Current frame of the stream
    pub fn latest_frame(&self) -> MediaResult<VideoFrame> {
        let stream = self.stream.upgrade().ok_or(MediaError::StreamClosed)?;
        stream.latest_frame().ok_or(MediaError::NoFrameAvailable)
    }
}

impl fmt::Debug for StreamView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamView")
            .field("device", &self.device.id)
            .field("resolution", &self.resolution)
            .field("open", &self.is_open())
            .finish()
    }
}

struct ManagerState {
    active: Option<LiveStream>,
    devices: Vec<CaptureDevice>,
    facing: FacingMode,
    permission_granted: bool,
}

/// Owns the live camera feed
pub struct MediaStreamManager {
    backend: Arc<dyn CaptureBackend>,
    constraints: StreamConstraints,
    state: Mutex<ManagerState>,
    generation: watch::Sender<u64>,
    switch_lock: tokio::sync::Mutex<()>,
    event_tx: broadcast::Sender<MediaEvent>,
}

impl MediaStreamManager {
    /// Create a manager preferring the rear camera at 1920x1080
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self::with_constraints(backend, StreamConstraints::default(), FacingMode::default())
    }

    /// Create a manager with explicit constraints and initial facing
    pub fn with_constraints(
        backend: Arc<dyn CaptureBackend>,
        constraints: StreamConstraints,
        facing: FacingMode,
    ) -> Self {
        let (generation, _) = watch::channel(0);
        let (event_tx, _) = broadcast::channel(64);
        Self {
            backend,
            constraints,
            state: Mutex::new(ManagerState {
                active: None,
                devices: Vec::new(),
                facing,
                permission_granted: false,
            }),
            generation,
            switch_lock: tokio::sync::Mutex::new(()),
            event_tx,
        }
    }

    /// Request camera access once, then enumerate cameras in platform order
    pub async fn list_devices(&self) -> MediaResult<Vec<CaptureDevice>> {
        let _switching = self.switch_lock.lock().await;

        let granted = self.state.lock().permission_granted;
        if !granted {
            match self.backend.request_permission(&self.constraints).await {
                Ok(probe) => {
                    probe.stop_all();
                    self.state.lock().permission_granted = true;
                    info!("Camera permission granted");
                }
                Err(e) => return Err(self.fail(e)),
            }
        }

        let devices: Vec<CaptureDevice> = match self.backend.enumerate_devices().await {
            Ok(all) => all
                .into_iter()
                .filter(|d| d.kind == DeviceKind::VideoInput)
                .collect(),
            Err(e) => return Err(self.fail(e)),
        };
        if devices.is_empty() {
            return Err(self.fail(MediaError::NoDeviceFound));
        }

        self.state.lock().devices = devices.clone();
        info!(count = devices.len(), "Cameras enumerated");
        let _ = self.event_tx.send(MediaEvent::DevicesChanged {
            count: devices.len(),
        });
        Ok(devices)
    }

    /// Replace the active stream with one matching `selector`
    pub async fn open_stream(&self, selector: DeviceSelector) -> MediaResult<StreamView> {
        let generation = self.next_generation();
        self.release();

        let _switching = self.switch_lock.lock().await;
        if *self.generation.borrow() != generation {
            debug!(%selector, "Open superseded before acquisition");
            return Err(MediaError::SwitchSuperseded);
        }

        debug!(%selector, generation, "Opening camera stream");
        let mut superseded = self.generation.subscribe();
        let opened = tokio::select! {
            result = self.backend.open(&selector, &self.constraints) => result,
            _ = superseded.wait_for(|current| *current != generation) => {
                debug!(%selector, "Open superseded during acquisition");
                return Err(MediaError::SwitchSuperseded);
            }
        };

        let stream = match opened {
            Ok(stream) => LiveStream::new(stream),
            Err(e) => return Err(self.fail(acquisition_error(e))),
        };
        let view = stream.view();

        {
            let mut state = self.state.lock();
            if *self.generation.borrow() != generation {
                drop(state);
                drop(stream);
                debug!(%selector, "Open superseded after acquisition");
                return Err(MediaError::SwitchSuperseded);
            }
            match &selector {
                DeviceSelector::Facing(mode) => state.facing = *mode,
                DeviceSelector::DeviceId(_) => {
                    if let Some(facing) = view.device.facing {
                        state.facing = facing;
                    }
                }
            }
            state.permission_granted = true;
            state.active = Some(stream);
        }

        info!(device_id = %view.device.id, resolution = %view.resolution, "Camera stream opened");
        let _ = self.event_tx.send(MediaEvent::StreamOpened {
            device_id: view.device.id.clone(),
            resolution: view.resolution,
        });
        Ok(view)
    }

    /// Open the camera with the opposite facing
    pub async fn toggle_facing(&self) -> MediaResult<StreamView> {
        let next = self.facing().flipped();
        self.open_stream(DeviceSelector::Facing(next)).await
    }

    /// Stop the active stream and cancel any in-flight open
    pub fn close(&self) {
        self.next_generation();
        self.release();
    }

    /// Handle to the active stream
    pub fn active(&self) -> Option<StreamView> {
        self.state.lock().active.as_ref().map(LiveStream::view)
    }

    /// Whether a stream is open
    pub fn is_streaming(&self) -> bool {
        self.state.lock().active.is_some()
    }

    /// Cameras from the last enumeration
    pub fn devices(&self) -> Vec<CaptureDevice> {
        self.state.lock().devices.clone()
    }

    /// Whether there is another camera to switch to
    pub fn can_switch(&self) -> bool {
        self.state.lock().devices.len() > 1
    }

    /// Facing used by the current (or next default) stream
    pub fn facing(&self) -> FacingMode {
        self.state.lock().facing
    }

    /// Subscribe to camera events
    pub fn subscribe_events(&self) -> broadcast::Receiver<MediaEvent> {
        self.event_tx.subscribe()
    }

    fn next_generation(&self) -> u64 {
        let mut next = 0;
        self.generation.send_modify(|g| {
            *g += 1;
            next = *g;
        });
        next
    }

    fn release(&self) {
        let stream = self.state.lock().active.take();
        if let Some(stream) = stream {
            let device_id = stream.device_id().to_string();
            drop(stream);
            info!(%device_id, "Camera stream closed");
            let _ = self.event_tx.send(MediaEvent::StreamClosed { device_id });
        }
    }

    fn fail(&self, error: MediaError) -> MediaError {
        warn!(error = %error, "Camera error");
        let _ = self.event_tx.send(MediaEvent::StreamError {
            message: error.user_message(),
        });
        error
    }
}

impl Drop for MediaStreamManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn acquisition_error(error: MediaError) -> MediaError {
    match error {
        MediaError::PermissionDenied { reason } => MediaError::StreamAcquisition {
            reason: format!("camera permission was revoked ({})", reason),
        },
        MediaError::NoDeviceFound => MediaError::StreamAcquisition {
            reason: "no camera is available".to_string(),
        },
        other => other,
    }
}
