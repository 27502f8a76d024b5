//! Backend wire protocol
//!
//! Two upload protocols are in use. The job variant answers an upload with a
//! job id that must be polled; the direct variant answers with the bucket id
//! of an album that is ready as soon as the upload returns. Which one applies
//! is a deployment decision carried by [`ProtocolVariant`], never inferred
//! from the response body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, CoreResult};
use crate::job::{Job, JobStatus};

/// Upload protocol spoken by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    /// `POST /upload` returns `{job_id, status}`; poll `/jobs/{id}`
    #[default]
    JobStatus,
    /// `POST /upload` returns `{id}` or `{process_id}`; album is ready
    Direct,
}

/// Parsed acknowledgement of an accepted upload
#[derive(Debug, Clone, PartialEq)]
pub enum UploadReceipt {
    /// Backend queued a job that must be polled
    Job(Job),
    /// Album is ready under this bucket id
    Direct {
        /// Album bucket id
        bucket_id: String,
    },
}

impl UploadReceipt {
    /// Bucket id of the album this upload produces
    pub fn bucket_id(&self) -> &str {
        match self {
            UploadReceipt::Job(job) => &job.job_id,
            UploadReceipt::Direct { bucket_id } => bucket_id,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobUploadBody {
    job_id: Value,
    #[serde(default)]
    status: Option<JobStatus>,
}

#[derive(Debug, Default, Deserialize)]
struct DirectUploadBody {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    process_id: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ImagesBody {
    #[serde(default)]
    images: Option<Vec<String>>,
}

/// Parse the body of a 2xx upload response.
///
/// `caller_bucket` is the bucket id sent as `?bucket=`; the direct variant
/// falls back to it when the backend does not echo an id.
pub fn parse_upload_response(
    variant: ProtocolVariant,
    body: &[u8],
    caller_bucket: Option<&str>,
) -> CoreResult<UploadReceipt> {
    match variant {
        ProtocolVariant::JobStatus => {
            let parsed: JobUploadBody = serde_json::from_slice(body)?;
            let job_id = id_string(&parsed.job_id).ok_or_else(|| CoreError::InvalidResponse {
                reason: "upload response carries an empty job_id".to_string(),
            })?;
            let status = parsed.status.unwrap_or(JobStatus::Pending);
            Ok(UploadReceipt::Job(Job::accepted(job_id, status)))
        }
        ProtocolVariant::Direct => {
            let parsed: DirectUploadBody = serde_json::from_slice(body).unwrap_or_default();
            parsed
                .id
                .as_ref()
                .and_then(id_string)
                .or_else(|| parsed.process_id.as_ref().and_then(id_string))
                .or_else(|| caller_bucket.map(str::to_string))
                .map(|bucket_id| UploadReceipt::Direct { bucket_id })
                .ok_or_else(|| CoreError::InvalidResponse {
                    reason: "upload response carries neither id nor process_id".to_string(),
                })
        }
    }
}

/// Parse a `GET /jobs/{id}` body
pub fn parse_job(body: &[u8]) -> CoreResult<Job> {
    Ok(serde_json::from_slice(body)?)
}

/// Parse a `GET /images` body. A missing or `null` list is an empty album.
pub fn parse_images(body: &[u8]) -> CoreResult<Vec<String>> {
    let parsed: ImagesBody = serde_json::from_slice(body)?;
    Ok(parsed.images.unwrap_or_default())
}

/// Best-effort human message from an error body (`{error}`, `{detail}` or text)
pub fn error_message(body: &[u8]) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) {
        for key in ["error", "detail", "message"] {
            match map.get(key) {
                Some(Value::String(s)) => return s.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    text.trim().chars().take(200).collect()
}

/// File name from a `Content-Disposition: attachment; filename=...` header
pub fn content_disposition_filename(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty() && !name.contains(['/', '\\']))
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
