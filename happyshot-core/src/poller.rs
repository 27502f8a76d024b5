//! Job status polling
//!
//! [`JobPoller`] drives a [`Job`] from its upload acknowledgement to a
//! terminal status by requesting `GET /jobs/{id}` on a fixed cadence. A fixed
//! interval bounds staleness to one period; there is no backoff.
//!
//! Requests that fail at the transport level (or answer non-2xx) are
//! transient misses: the job is left untouched and the next tick retries.
//! Only an explicit `failed` status ends polling with an error. Consecutive
//! misses are capped by [`PollPolicy::max_consecutive_misses`].
//!
//! Polling runs on tokio's clock, so tests drive it with a paused runtime.
//! The task behind a [`PollerHandle`] is aborted when the handle is cancelled
//! or dropped; no request is issued after that.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{CoreError, CoreResult};
use crate::job::{Job, JobStatus, JobUpdate};

/// Default polling cadence
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Default cap on consecutive transient misses (one minute at 2 s)
pub const DEFAULT_MAX_CONSECUTIVE_MISSES: u32 = 30;

/// Polling cadence and retry policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    /// Time between two status requests
    pub interval: Duration,
    /// Give up after this many consecutive misses; `None` retries forever
    pub max_consecutive_misses: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_consecutive_misses: Some(DEFAULT_MAX_CONSECUTIVE_MISSES),
        }
    }
}

impl PollPolicy {
    /// Reject a zero interval or a zero miss cap
    pub fn validate(&self) -> CoreResult<()> {
        if self.interval.is_zero() {
            return Err(CoreError::InvalidConfiguration {
                field: "poll_interval".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_consecutive_misses == Some(0) {
            return Err(CoreError::InvalidConfiguration {
                field: "max_consecutive_misses".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Observable polling progress
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A status request answered successfully
    Polled {
        /// Status after applying the response
        status: JobStatus,
        /// 1-based request count
        attempt: u32,
    },
    /// The job moved forward
    StatusChanged {
        /// Previous status
        from: JobStatus,
        /// New status
        to: JobStatus,
    },
    /// A status request failed and will be retried on the next tick
    TransientMiss {
        /// Consecutive misses so far
        consecutive: u32,
        /// Failure description
        reason: String,
    },
    /// A response tried to move the job backwards and was ignored
    RegressionIgnored {
        /// Status kept
        current: JobStatus,
        /// Status reported by the ignored response
        reported: JobStatus,
    },
}

/// Polls one job until it completes or fails
#[derive(Clone)]
pub struct JobPoller {
    backend: Arc<dyn Backend>,
    policy: PollPolicy,
}

impl JobPoller {
    /// Create a poller
    pub fn new(backend: Arc<dyn Backend>, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// Policy in use
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Poll in the calling task until `initial` reaches a terminal status.
    ///
    /// Resolves with the completed job, or [`CoreError::JobFailed`] carrying
    /// the backend's reason. An invalid [`PollPolicy`] fails before any
    /// request.
    pub async fn run<F>(&self, initial: Job, mut on_event: F) -> CoreResult<Job>
    where
        F: FnMut(PollEvent),
    {
        self.policy.validate()?;
        let mut job = initial;
        if job.is_terminal() {
            return finish(job);
        }

        let period = self.policy.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut attempt = 0u32;
        let mut misses = 0u32;
        info!(job_id = %job.job_id, status = %job.status, interval_ms = period.as_millis() as u64, "Polling job");

        loop {
            ticker.tick().await;
            attempt += 1;

            match self.backend.job_status(&job.job_id).await {
                Ok(mut reported) => {
                    misses = 0;
                    if reported.job_id != job.job_id {
                        warn!(expected = %job.job_id, got = %reported.job_id, "Status response for another job id");
                        reported.job_id = job.job_id.clone();
                    }

                    match job.apply(reported) {
                        JobUpdate::Advanced { from, to } => {
                            info!(job_id = %job.job_id, %from, %to, "Job status changed");
                            on_event(PollEvent::StatusChanged { from, to });
                        }
                        JobUpdate::Unchanged => {
                            debug!(job_id = %job.job_id, status = %job.status, attempt, "Job status unchanged");
                        }
                        JobUpdate::Rejected { current, reported } => {
                            warn!(job_id = %job.job_id, %current, %reported, "Ignoring backward status transition");
                            on_event(PollEvent::RegressionIgnored { current, reported });
                        }
                    }
                    on_event(PollEvent::Polled {
                        status: job.status,
                        attempt,
                    });
                }
                Err(e) => {
                    misses += 1;
                    warn!(job_id = %job.job_id, consecutive = misses, error = %e, "Status poll missed");
                    on_event(PollEvent::TransientMiss {
                        consecutive: misses,
                        reason: e.to_string(),
                    });

                    if let Some(max) = self.policy.max_consecutive_misses {
                        if misses >= max {
                            return Err(CoreError::PollingExhausted { attempts: misses });
                        }
                    }
                }
            }

            if job.is_terminal() {
                return finish(job);
            }
        }
    }

    /// Poll on a background task
    pub fn spawn<F>(&self, initial: Job, on_event: F) -> PollerHandle
    where
        F: FnMut(PollEvent) + Send + 'static,
    {
        let poller = self.clone();
        let job_id = initial.job_id.clone();
        let task = tokio::spawn(async move { poller.run(initial, on_event).await });
        PollerHandle {
            job_id,
            task: Some(task),
        }
    }
}

fn finish(job: Job) -> CoreResult<Job> {
    match job.status {
        JobStatus::Failed => {
            let reason = job.failure_reason();
            warn!(job_id = %job.job_id, %reason, "Job failed");
            Err(CoreError::JobFailed { reason })
        }
        _ => Ok(job),
    }
}

/// Owns a background polling task; aborts it on cancel or drop
#[derive(Debug)]
pub struct PollerHandle {
    job_id: String,
    task: Option<JoinHandle<CoreResult<Job>>>,
}

impl PollerHandle {
    /// Job being polled
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop polling now
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            debug!(job_id = %self.job_id, "Cancelling poller");
            task.abort();
        }
    }

    /// Whether the task has ended (or was cancelled)
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the polling outcome. Dropping the returned future aborts
    /// the task.
    pub async fn join(mut self) -> CoreResult<Job> {
        let Some(task) = self.task.as_mut() else {
            return Err(CoreError::Cancelled);
        };
        let outcome = task.await;
        self.task = None;
        match outcome {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(CoreError::Cancelled),
            Err(e) => Err(CoreError::InvalidResponse {
                reason: format!("polling task panicked: {}", e),
            }),
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval, Duration::from_millis(2000));
        assert_eq!(policy.max_consecutive_misses, Some(30));
    }

    #[test]
    fn test_policy_validation() {
        assert!(PollPolicy::default().validate().is_ok());

        let zero_interval = PollPolicy {
            interval: Duration::ZERO,
            ..PollPolicy::default()
        };
        assert!(matches!(
            zero_interval.validate(),
            Err(CoreError::InvalidConfiguration { .. })
        ));

        let zero_cap = PollPolicy {
            max_consecutive_misses: Some(0),
            ..PollPolicy::default()
        };
        assert!(zero_cap.validate().is_err());

        let unbounded = PollPolicy {
            max_consecutive_misses: None,
            ..PollPolicy::default()
        };
        assert!(unbounded.validate().is_ok());
    }

    #[test]
    fn test_finish_failed_uses_reason() {
        let mut job = Job::accepted("x", JobStatus::Failed);
        job.error = Some("boom".to_string());
        match finish(job) {
            Err(CoreError::JobFailed { reason }) => assert_eq!(reason, "boom"),
            other => panic!("Expected JobFailed, got {:?}", other),
        }
    }
}
