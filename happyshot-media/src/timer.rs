//! Self-timer countdown
//!
//! A countdown of `n` seconds reports `n, n-1, ..., 1` one second apart,
//! starting immediately, and fires the capture callback at `n` seconds.
//! A zero countdown fires at once without ticking. Only one countdown runs
//! per timer; starting another cancels the first.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

/// Countdown before a snapshot
#[derive(Debug, Default)]
pub struct CaptureTimer {
    task: Mutex<Option<JoinHandle<()>>>,
}

impl CaptureTimer {
    /// Create an idle timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a countdown, replacing any running one.
    ///
    /// Must be called within a tokio runtime when `seconds > 0`.
    pub fn start<T, C>(&self, seconds: u32, mut on_tick: T, on_capture: C)
    where
        T: FnMut(u32) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let mut slot = self.task.lock();
        if let Some(previous) = slot.take() {
            if !previous.is_finished() {
                debug!("Countdown replaced");
            }
            previous.abort();
        }

        if seconds == 0 {
            drop(slot);
            debug!("Capturing without countdown");
            on_capture();
            return;
        }

        debug!(seconds, "Countdown started");
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(TICK);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            for remaining in (1..=seconds).rev() {
                ticker.tick().await;
                on_tick(remaining);
            }
            ticker.tick().await;
            debug!("Countdown finished");
            on_capture();
        }));
    }

    /// Stop the running countdown without capturing
    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            if !task.is_finished() {
                debug!("Countdown cancelled");
            }
            task.abort();
        }
    }

    /// Whether a countdown is in progress
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }
}

impl Drop for CaptureTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
