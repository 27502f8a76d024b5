//! Backend job model
//!
//! A [`Job`] tracks one uploaded media file through the backend's processing
//! queue. Its status only moves forward along
//! `pending -> processing -> {completed | failed}` and the two terminal states
//! are absorbing.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::GENERIC_JOB_FAILURE;

/// Processing status reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted, not yet picked up
    Pending,
    /// Being processed
    Processing,
    /// Album is ready
    Completed,
    /// Processing failed
    Failed,
}

impl JobStatus {
    /// Terminal statuses admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            JobStatus::Pending => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    /// Whether moving from `self` to `next` respects the forward-only order.
    /// Re-reporting the same non-terminal status is allowed.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    /// Wire name of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend-tracked unit of asynchronous processing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Backend job identifier; doubles as the album bucket id
    pub job_id: String,
    /// Current status
    pub status: JobStatus,
    /// When the backend accepted the job
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Failure reason, only meaningful when failed
    #[serde(default)]
    pub error: Option<String>,
    /// Opaque processing result
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

/// Outcome of applying a poll response to the in-memory job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobUpdate {
    /// Status did not change
    Unchanged,
    /// Status moved forward
    Advanced {
        /// Previous status
        from: JobStatus,
        /// New status
        to: JobStatus,
    },
    /// Response would have moved the job backwards or out of a terminal state
    Rejected {
        /// Current status
        current: JobStatus,
        /// Status carried by the rejected response
        reported: JobStatus,
    },
}

impl Job {
    /// Create the initial job from an upload acknowledgement
    pub fn accepted(job_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            job_id: job_id.into(),
            status,
            created_at: Some(Utc::now()),
            completed_at: None,
            error: None,
            result: None,
        }
        .normalized()
    }

    /// Enforce `completed_at` iff terminal
    pub fn normalized(mut self) -> Self {
        if self.status.is_terminal() {
            if self.completed_at.is_none() {
                self.completed_at = Some(Utc::now());
            }
        } else {
            self.completed_at = None;
        }
        self
    }

    /// Whether the job reached `completed` or `failed`
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Replace this job with a poll response if the transition is legal
    pub fn apply(&mut self, reported: Job) -> JobUpdate {
        let current = self.status;
        if !current.can_transition_to(reported.status) {
            return JobUpdate::Rejected {
                current,
                reported: reported.status,
            };
        }

        let created_at = self.created_at;
        *self = reported.normalized();
        if self.created_at.is_none() {
            self.created_at = created_at;
        }

        if current == self.status {
            JobUpdate::Unchanged
        } else {
            JobUpdate::Advanced {
                from: current,
                to: self.status,
            }
        }
    }

    /// Reason to surface for a failed job
    pub fn failure_reason(&self) -> String {
        match self.error.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => reason.to_string(),
            _ => GENERIC_JOB_FAILURE.to_string(),
        }
    }
}

/// Accepts RFC 3339 timestamps and the zone-less ISO form most Python
/// backends emit, treating the latter as UTC.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = raw else {
        return Ok(None);
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(status: JobStatus) -> Job {
        Job::accepted("job-1", status)
    }

    #[test]
    fn test_forward_transitions() {
        let mut current = job(JobStatus::Pending);
        assert_eq!(
            current.apply(job(JobStatus::Processing)),
            JobUpdate::Advanced {
                from: JobStatus::Pending,
                to: JobStatus::Processing
            }
        );
        assert_eq!(current.apply(job(JobStatus::Processing)), JobUpdate::Unchanged);
        assert!(matches!(
            current.apply(job(JobStatus::Completed)),
            JobUpdate::Advanced { .. }
        ));
        assert!(current.completed_at.is_some());
    }

    #[test]
    fn test_backward_transition_rejected() {
        let mut current = job(JobStatus::Processing);
        let update = current.apply(job(JobStatus::Pending));
        assert_eq!(
            update,
            JobUpdate::Rejected {
                current: JobStatus::Processing,
                reported: JobStatus::Pending
            }
        );
        assert_eq!(current.status, JobStatus::Processing);
    }

    #[test]
    fn test_terminal_states_absorb() {
        for terminal in [JobStatus::Completed, JobStatus::Failed] {
            let mut current = job(terminal);
            for next in [
                JobStatus::Pending,
                JobStatus::Processing,
                JobStatus::Completed,
                JobStatus::Failed,
            ] {
                assert!(matches!(current.apply(job(next)), JobUpdate::Rejected { .. }));
                assert_eq!(current.status, terminal);
            }
        }
    }

    #[test]
    fn test_completed_at_only_when_terminal() {
        let mut pending = job(JobStatus::Pending);
        pending.completed_at = Some(Utc::now());
        assert!(pending.normalized().completed_at.is_none());
        assert!(job(JobStatus::Failed).completed_at.is_some());
    }

    #[test]
    fn test_failure_reason_fallback() {
        let mut failed = job(JobStatus::Failed);
        assert_eq!(failed.failure_reason(), GENERIC_JOB_FAILURE);
        failed.error = Some("boom".to_string());
        assert_eq!(failed.failure_reason(), "boom");
    }

    #[test]
    fn test_parse_python_timestamps() {
        let json = r#"{
            "job_id": "abc",
            "status": "completed",
            "created_at": "2024-05-01T10:00:00.123456",
            "completed_at": "2024-05-01T10:01:00Z",
            "error": null
        }"#;
        let job: Job = serde_json::from_str(json).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.created_at.is_some());
        assert!(job.completed_at.is_some());
        assert!(job.result.is_none());
    }
}
