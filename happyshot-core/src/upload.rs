//! Upload transport with progress reporting

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::backend::{Backend, ByteProgress};
use crate::error::{CoreError, CoreResult};
use crate::media::CapturedMedia;
use crate::protocol::UploadReceipt;

/// Byte progress is held below this until the backend accepts the upload
const MAX_PROGRESS_BEFORE_ACK: f32 = 99.0;

/// Clamps reported percentages to `[0, 100]` and drops any value that would
/// move progress backwards.
pub struct ProgressTracker {
    last: Mutex<Option<f32>>,
    callback: Box<dyn Fn(f32) + Send + Sync>,
}

impl ProgressTracker {
    /// Wrap a progress callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        Self {
            last: Mutex::new(None),
            callback: Box::new(callback),
        }
    }

    /// Report a percentage; forwarded only if it does not regress
    pub fn report(&self, percent: f32) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        {
            let mut last = self.last.lock();
            if matches!(*last, Some(prev) if percent <= prev) {
                return;
            }
            *last = Some(percent);
        }
        (self.callback)(percent);
    }

    /// Report bytes sent out of a total
    pub fn report_bytes(&self, sent: u64, total: u64) {
        if total == 0 {
            return;
        }
        let percent = (sent as f64 / total as f64 * 100.0) as f32;
        self.report(percent.min(MAX_PROGRESS_BEFORE_ACK));
    }

    /// Last forwarded value
    pub fn last(&self) -> Option<f32> {
        *self.last.lock()
    }
}

/// Releases the in-flight flag however the upload ends
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> CoreResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::UploadInFlight)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Sends media to the backend, one upload at a time
pub struct UploadTransport {
    backend: Arc<dyn Backend>,
    allowed_mime_prefixes: Vec<String>,
    in_flight: Arc<AtomicBool>,
}

impl UploadTransport {
    /// Create a transport accepting the given mime prefixes (empty = any)
    pub fn new(backend: Arc<dyn Backend>, allowed_mime_prefixes: Vec<String>) -> Self {
        Self {
            backend,
            allowed_mime_prefixes,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether an upload is currently in flight
    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Upload `media`, reporting non-decreasing progress that ends at 100 on
    /// success. A second call while one is in flight fails with
    /// [`CoreError::UploadInFlight`].
    pub async fn upload<F>(
        &self,
        media: &CapturedMedia,
        bucket: Option<&str>,
        on_progress: F,
    ) -> CoreResult<UploadReceipt>
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        let _guard = InFlightGuard::acquire(&self.in_flight)?;
        media.validate(&self.allowed_mime_prefixes)?;

        let tracker = Arc::new(ProgressTracker::new(on_progress));
        tracker.report(0.0);

        let byte_tracker = tracker.clone();
        let progress: ByteProgress =
            Arc::new(move |sent, total| byte_tracker.report_bytes(sent, total));

        let started = Instant::now();
        info!(
            bytes = media.len(),
            mime = media.mime_type(),
            bucket = bucket.unwrap_or("-"),
            "Uploading media"
        );

        match self.backend.upload(media, bucket, progress).await {
            Ok(receipt) => {
                tracker.report(100.0);
                info!(
                    bucket_id = receipt.bucket_id(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Upload accepted"
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(error = %e, "Upload failed");
                debug!(last_progress = ?tracker.last(), "Progress at failure");
                Err(e)
            }
        }
    }
}
