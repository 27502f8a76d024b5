//! # HappyShot Core
//!
//! Submission, polling and retrieval pipeline for the HappyShot processing
//! backend. A captured photo or video is uploaded, the resulting job is
//! polled until it is terminal, and the derived album is listed and
//! downloaded.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod album;
pub mod backend;
pub mod error;
pub mod job;
pub mod media;
pub mod poller;
pub mod protocol;
pub mod upload;

// Re-export main types
pub use album::{Album, AlbumFetcher, DirectorySaveTarget, DownloadOutcome, SaveTarget};
pub use backend::{ArchiveDownload, Backend, ByteProgress, HttpBackend, HttpBackendConfig};
pub use error::{CoreError, CoreResult, ErrorCategory, GENERIC_JOB_FAILURE};
pub use job::{Job, JobStatus, JobUpdate};
pub use media::CapturedMedia;
pub use poller::{
    JobPoller, PollEvent, PollPolicy, PollerHandle, DEFAULT_MAX_CONSECUTIVE_MISSES,
    DEFAULT_POLL_INTERVAL,
};
pub use protocol::{ProtocolVariant, UploadReceipt};
pub use upload::{ProgressTracker, UploadTransport};
