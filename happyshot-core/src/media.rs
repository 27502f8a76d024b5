//! Media payloads handed to the upload transport

use bytes::Bytes;
use std::path::Path;

use crate::error::{CoreError, CoreResult};

/// An immutable media payload produced by a snapshot or a file selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedMedia {
    bytes: Bytes,
    mime_type: String,
    file_name: Option<String>,
}

impl CapturedMedia {
    /// Wrap an encoded payload
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
            file_name: None,
        }
    }

    /// Attach the name sent in the multipart `file` field
    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    /// Read a user-selected file, inferring the mime type from its extension
    pub async fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let mime_type = mime_from_extension(path).ok_or_else(|| CoreError::UnsupportedMedia {
            reason: format!("Unrecognised file type: {}", path.display()),
        })?;

        let mut media = Self::new(bytes, mime_type);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            media = media.with_file_name(name);
        }
        Ok(media)
    }

    /// Encoded payload
    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// Mime type, e.g. `image/jpeg` or `video/mp4`
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// File name for the multipart part, derived from the mime type if unset
    pub fn file_name(&self) -> String {
        if let Some(name) = &self.file_name {
            return name.clone();
        }
        let ext = self
            .mime_type
            .split('/')
            .nth(1)
            .map(|sub| if sub == "jpeg" { "jpg" } else { sub })
            .unwrap_or("bin");
        format!("upload.{}", ext)
    }

    /// Reject payloads the backend would refuse anyway
    pub fn validate(&self, allowed_mime_prefixes: &[String]) -> CoreResult<()> {
        if self.bytes.is_empty() {
            return Err(CoreError::UnsupportedMedia {
                reason: "The selected file is empty.".to_string(),
            });
        }
        if !allowed_mime_prefixes.is_empty()
            && !allowed_mime_prefixes
                .iter()
                .any(|prefix| self.mime_type.starts_with(prefix.as_str()))
        {
            return Err(CoreError::UnsupportedMedia {
                reason: format!(
                    "Only {} files can be uploaded (got {}).",
                    allowed_mime_prefixes.join(", "),
                    self.mime_type
                ),
            });
        }
        Ok(())
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "avi" => "video/x-msvideo",
        _ => return None,
    };
    Some(mime)
}
