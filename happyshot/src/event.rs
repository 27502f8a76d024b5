//! View state exposed to the UI layer
//!
//! A session is in exactly one [`ViewState`] at a time. States only move
//! forward (`Idle` → `Uploading` → `Waiting` → `Ready`); `Error` can be
//! entered from any state that is not terminal, and both `Ready` and
//! `Error` are terminal.

use happyshot_core::{Album, JobStatus};
use tokio::sync::watch;

use crate::error::ErrorKind;

/// What the UI should show for a session
#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    /// Nothing submitted yet
    Idle,
    /// Media is being sent
    Uploading {
        /// Percent in [0, 100], non-decreasing
        progress: f32,
    },
    /// Backend is processing
    Waiting {
        /// Last reported job status
        status: JobStatus,
    },
    /// Album available; may be empty
    Ready {
        /// Resulting album
        album: Album,
    },
    /// Session failed
    Error {
        /// Failure class
        kind: ErrorKind,
        /// User-facing message
        message: String,
    },
}

impl ViewState {
    /// Get the state type as a string
    pub fn state_type(&self) -> &'static str {
        match self {
            ViewState::Idle => "idle",
            ViewState::Uploading { .. } => "uploading",
            ViewState::Waiting { .. } => "waiting",
            ViewState::Ready { .. } => "ready",
            ViewState::Error { .. } => "error",
        }
    }

    /// Whether no further transition can happen
    pub fn is_terminal(&self) -> bool {
        matches!(self, ViewState::Ready { .. } | ViewState::Error { .. })
    }

    /// Ready with no images
    pub fn is_empty_album(&self) -> bool {
        matches!(self, ViewState::Ready { album } if album.is_empty())
    }

    fn rank(&self) -> u8 {
        match self {
            ViewState::Idle => 0,
            ViewState::Uploading { .. } => 1,
            ViewState::Waiting { .. } => 2,
            ViewState::Ready { .. } => 3,
            ViewState::Error { .. } => 4,
        }
    }

    /// Whether moving from `self` to `next` is a forward step
    pub fn can_transition_to(&self, next: &ViewState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, ViewState::Error { .. }) => true,
            (ViewState::Uploading { progress: a }, ViewState::Uploading { progress: b }) => b > a,
            (ViewState::Waiting { status: a }, ViewState::Waiting { status: b }) => {
                a != b && a.can_transition_to(*b)
            }
            _ => next.rank() > self.rank(),
        }
    }
}

/// Latest-value stream of a session's view state
#[derive(Debug, Clone)]
pub struct ViewStateStream {
    receiver: watch::Receiver<ViewState>,
}

impl ViewStateStream {
    pub(crate) fn new(receiver: watch::Receiver<ViewState>) -> Self {
        Self { receiver }
    }

    /// State right now
    pub fn current(&self) -> ViewState {
        self.receiver.borrow().clone()
    }

    /// Wait for the next state; intermediate values may be skipped.
    /// Returns `None` once the session is gone.
    pub async fn next(&mut self) -> Option<ViewState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Wait until the session reaches `Ready` or `Error`
    pub async fn terminal(&mut self) -> Option<ViewState> {
        self.receiver
            .wait_for(ViewState::is_terminal)
            .await
            .ok()
            .map(|state| (*state).clone())
    }
}
