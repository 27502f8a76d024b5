//! Album retrieval and bulk download

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::backend::Backend;
use crate::error::{CoreError, CoreResult};

/// Ordered image collection produced by one job or upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Bucket the images live in
    pub bucket_id: String,
    /// Image URLs in server order
    pub images: Vec<String>,
}

impl Album {
    /// Whether the album has no images (a valid display state)
    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    /// Number of images
    pub fn len(&self) -> usize {
        self.images.len()
    }
}

/// Where a downloaded archive should be written.
///
/// Typically backed by a save dialog; returning `None` means the user
/// dismissed it.
#[async_trait]
pub trait SaveTarget: Send + Sync {
    /// Pick a destination for an archive the server suggests naming
    /// `suggested_name`
    async fn choose_destination(&self, suggested_name: &str) -> Option<PathBuf>;
}

/// Saves every archive into a fixed directory under the suggested name
#[derive(Debug, Clone)]
pub struct DirectorySaveTarget {
    dir: PathBuf,
}

impl DirectorySaveTarget {
    /// Save into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl SaveTarget for DirectorySaveTarget {
    async fn choose_destination(&self, suggested_name: &str) -> Option<PathBuf> {
        Some(self.dir.join(suggested_name))
    }
}

/// Result of a bulk download
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Archive written to `path`
    Saved {
        /// Final location
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },
    /// The user cancelled the save
    Cancelled,
}

/// Fetches finished albums from the backend
#[derive(Clone)]
pub struct AlbumFetcher {
    backend: Arc<dyn Backend>,
}

impl AlbumFetcher {
    /// Create a fetcher
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// List the album's image URLs; an empty list is not an error
    pub async fn fetch_album(&self, bucket_id: &str) -> CoreResult<Album> {
        let images = self.backend.list_images(bucket_id).await?;
        info!(bucket_id, count = images.len(), "Album fetched");
        Ok(Album {
            bucket_id: bucket_id.to_string(),
            images,
        })
    }

    /// Stream the album archive to a destination chosen by `target`
    pub async fn download_all(
        &self,
        bucket_id: &str,
        target: &dyn SaveTarget,
    ) -> CoreResult<DownloadOutcome> {
        let mut archive = self.backend.download_archive(bucket_id).await?;
        let suggested = archive
            .suggested_name
            .clone()
            .unwrap_or_else(|| format!("{}.zip", bucket_id));

        let Some(path) = target.choose_destination(&suggested).await else {
            info!(bucket_id, "Download cancelled by user");
            return Ok(DownloadOutcome::Cancelled);
        };

        let partial = partial_path(&path);
        debug!(bucket_id, path = %path.display(), expected = ?archive.content_length, "Saving archive");

        let written = async {
            let mut file = tokio::fs::File::create(&partial).await?;
            let mut written = 0u64;
            while let Some(chunk) = archive.body.next().await {
                let chunk = chunk?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
            }
            file.flush().await?;
            Ok::<u64, CoreError>(written)
        }
        .await;

        match written {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &path).await?;
                info!(bucket_id, bytes, path = %path.display(), "Archive saved");
                Ok(DownloadOutcome::Saved { path, bytes })
            }
            Err(e) => {
                warn!(bucket_id, error = %e, "Archive download interrupted");
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    debug!(error = %cleanup, "Could not remove partial archive");
                }
                Err(e)
            }
        }
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/tmp/images.zip")),
            PathBuf::from("/tmp/images.zip.part")
        );
    }

    #[test]
    fn test_empty_album() {
        let album = Album {
            bucket_id: "b".to_string(),
            images: Vec::new(),
        };
        assert!(album.is_empty());
        assert_eq!(album.len(), 0);
    }
}
