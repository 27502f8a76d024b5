//! Processing backend access
//!
//! [`Backend`] is the seam between the pipeline and the HTTP surface of the
//! processing service. [`HttpBackend`] speaks to a real server with reqwest;
//! tests substitute scripted implementations.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{header, Client, Response, Url};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{CoreError, CoreResult};
use crate::job::Job;
use crate::media::CapturedMedia;
use crate::protocol::{self, ProtocolVariant, UploadReceipt};

/// Size of the slices the upload body is streamed in
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Reports `(bytes_sent, bytes_total)` while an upload body is streamed
pub type ByteProgress = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// A streamed binary archive of an album
pub struct ArchiveDownload {
    /// Name proposed by the server, if any
    pub suggested_name: Option<String>,
    /// Length announced by the server
    pub content_length: Option<u64>,
    /// Archive bytes
    pub body: BoxStream<'static, CoreResult<Bytes>>,
}

impl std::fmt::Debug for ArchiveDownload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveDownload")
            .field("suggested_name", &self.suggested_name)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Operations the pipeline needs from the processing backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /upload` with the payload in multipart field `file`
    async fn upload(
        &self,
        media: &CapturedMedia,
        bucket: Option<&str>,
        progress: ByteProgress,
    ) -> CoreResult<UploadReceipt>;

    /// `GET /jobs/{id}`
    async fn job_status(&self, job_id: &str) -> CoreResult<Job>;

    /// `GET /images?bucket={id}`
    async fn list_images(&self, bucket_id: &str) -> CoreResult<Vec<String>>;

    /// `GET /download?bucket={id}`
    async fn download_archive(&self, bucket_id: &str) -> CoreResult<ArchiveDownload>;

    /// `GET /health`
    async fn health(&self) -> CoreResult<bool>;

    /// Upload protocol this backend speaks
    fn variant(&self) -> ProtocolVariant;
}

/// HTTP backend configuration
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Base URL, e.g. `http://localhost:5000`
    pub base_url: String,
    /// Upload protocol
    pub variant: ProtocolVariant,
    /// Timeout for status, listing and health requests
    pub request_timeout: Duration,
    /// Timeout for establishing connections
    pub connect_timeout: Duration,
}

impl Default for HttpBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            variant: ProtocolVariant::JobStatus,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// reqwest-based [`Backend`]
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// Create a backend for the configured server
    pub fn new(config: HttpBackendConfig) -> CoreResult<Self> {
        let base = Url::parse(&config.base_url).map_err(|e| CoreError::InvalidConfiguration {
            field: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        if base.cannot_be_a_base() {
            return Err(CoreError::InvalidConfiguration {
                field: "base_url".to_string(),
                reason: format!("{} cannot be used as a base URL", base),
            });
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| CoreError::InvalidConfiguration {
                field: "http_client".to_string(),
                reason: e.to_string(),
            })?;

        info!(base_url = %base, variant = ?config.variant, "HTTP backend ready");
        Ok(Self {
            client,
            base,
            config,
        })
    }

    /// Configuration in use
    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn endpoint(&self, segments: &[&str]) -> CoreResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CoreError::InvalidConfiguration {
                field: "base_url".to_string(),
                reason: "cannot append path segments".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, err: reqwest::Error, timeout: Duration) -> CoreError {
        if err.is_timeout() {
            CoreError::Timeout { duration: timeout }
        } else {
            err.into()
        }
    }

    async fn get(&self, url: Url, query: &[(&str, &str)]) -> CoreResult<Response> {
        let timeout = self.config.request_timeout;
        self.client
            .get(url)
            .query(query)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| self.transport_error(e, timeout))
    }

    async fn read_body(&self, response: Response) -> CoreResult<Bytes> {
        let timeout = self.config.request_timeout;
        response
            .bytes()
            .await
            .map_err(|e| self.transport_error(e, timeout))
    }
}

/// Splits the payload into a body stream that reports each slice as it is
/// handed to the connection.
fn progress_body(bytes: Bytes, progress: ByteProgress) -> reqwest::Body {
    let total = bytes.len();
    let slices = stream::iter((0..total).step_by(UPLOAD_CHUNK_SIZE)).map(move |start| {
        let end = (start + UPLOAD_CHUNK_SIZE).min(total);
        progress(end as u64, total as u64);
        Ok::<Bytes, std::io::Error>(bytes.slice(start..end))
    });
    reqwest::Body::wrap_stream(slices)
}

#[async_trait]
impl Backend for HttpBackend {
    async fn upload(
        &self,
        media: &CapturedMedia,
        bucket: Option<&str>,
        progress: ByteProgress,
    ) -> CoreResult<UploadReceipt> {
        let url = self.endpoint(&["upload"])?;
        let total = media.len() as u64;
        let part = Part::stream_with_length(progress_body(media.bytes().clone(), progress), total)
            .file_name(media.file_name())
            .mime_str(media.mime_type())
            .map_err(|e| CoreError::UnsupportedMedia {
                reason: e.to_string(),
            })?;
        let form = Form::new().part("file", part);

        let mut request = self.client.post(url).multipart(form);
        if let Some(bucket) = bucket {
            request = request.query(&[("bucket", bucket)]);
        }

        debug!(bytes = total, mime = media.mime_type(), "Sending upload");
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let message = protocol::error_message(&body);
            warn!(http_status = status.as_u16(), %message, "Upload rejected");
            return Err(CoreError::UploadRejected {
                http_status: status.as_u16(),
                message,
            });
        }

        protocol::parse_upload_response(self.config.variant, &body, bucket)
    }

    async fn job_status(&self, job_id: &str) -> CoreResult<Job> {
        let response = self.get(self.endpoint(&["jobs", job_id])?, &[]).await?;
        let status = response.status();
        let body = self.read_body(response).await?;
        if !status.is_success() {
            return Err(CoreError::InvalidResponse {
                reason: format!(
                    "job status returned HTTP {}: {}",
                    status.as_u16(),
                    protocol::error_message(&body)
                ),
            });
        }
        protocol::parse_job(&body)
    }

    async fn list_images(&self, bucket_id: &str) -> CoreResult<Vec<String>> {
        let response = self
            .get(self.endpoint(&["images"])?, &[("bucket", bucket_id)])
            .await?;
        let status = response.status();
        let body = self.read_body(response).await?;
        if !status.is_success() {
            return Err(CoreError::InvalidResponse {
                reason: format!(
                    "image listing returned HTTP {}: {}",
                    status.as_u16(),
                    protocol::error_message(&body)
                ),
            });
        }
        protocol::parse_images(&body)
    }

    async fn download_archive(&self, bucket_id: &str) -> CoreResult<ArchiveDownload> {
        let url = self.endpoint(&["download"])?;
        // No overall timeout: archives can be large and are streamed.
        let response = self
            .client
            .get(url)
            .query(&[("bucket", bucket_id)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::DownloadFailed {
                http_status: status.as_u16(),
            });
        }

        let suggested_name = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(protocol::content_disposition_filename);
        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(CoreError::from))
            .boxed();

        Ok(ArchiveDownload {
            suggested_name,
            content_length,
            body,
        })
    }

    async fn health(&self) -> CoreResult<bool> {
        match self.get(self.endpoint(&["health"])?, &[]).await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) if e.is_recoverable() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn variant(&self) -> ProtocolVariant {
        self.config.variant
    }
}
