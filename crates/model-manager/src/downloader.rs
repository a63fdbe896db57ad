//! Artifact downloader
//!
//! Mirrors an artifact directory from the MLflow artifact proxy
//! (`/api/2.0/mlflow-artifacts/artifacts`) onto local disk, streaming each
//! file into a `.download` file that is renamed once complete.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::StreamExt;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use common::error::{Error, Result};
use common::utils::format_bytes;

use crate::registry::ensure_success;

const ARTIFACTS_ENDPOINT: [&str; 4] = ["api", "2.0", "mlflow-artifacts", "artifacts"];

#[derive(Debug, Deserialize)]
struct ListArtifactsResponse {
    #[serde(default)]
    files: Vec<RemoteFile>,
}

/// One entry of an artifact listing
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    /// Entry name, relative to the listed directory
    pub path: String,

    /// Whether the entry is a directory
    #[serde(default)]
    pub is_dir: bool,
}

impl RemoteFile {
    fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// Downloads artifact trees through the MLflow artifact proxy
#[derive(Debug, Clone)]
pub struct ArtifactDownloader {
    /// HTTP client
    client: Client,

    /// Tracking server base URL
    base_url: Url,
}

impl ArtifactDownloader {
    /// Creates a new artifact downloader
    pub fn new(client: Client, tracking_uri: &str) -> Result<Self> {
        let base_url = Url::parse(tracking_uri)
            .map_err(|e| Error::Config(format!("Invalid tracking URI {:?}: {}", tracking_uri, e)))?;

        Ok(Self { client, base_url })
    }

    /// Downloads every file below `remote_root` into `destination`
    ///
    /// Returns the number of bytes written.
    pub async fn download_tree(&self, remote_root: &str, destination: &Path) -> Result<u64> {
        let started = Instant::now();
        let remote_root = remote_root.trim_matches('/');

        let mut pending: Vec<(String, PathBuf)> = vec![(remote_root.to_string(), destination.to_path_buf())];
        let mut total_bytes = 0u64;
        let mut files = 0usize;

        while let Some((remote_dir, local_dir)) = pending.pop() {
            tokio::fs::create_dir_all(&local_dir).await?;

            for entry in self.list(&remote_dir).await? {
                let name = entry.name();
                if name.is_empty() || name == "." || name == ".." {
                    continue;
                }

                let remote_path = if remote_dir.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", remote_dir, name)
                };
                let local_path = local_dir.join(name);

                if entry.is_dir {
                    pending.push((remote_path, local_path));
                } else {
                    total_bytes += self.download_file(&remote_path, &local_path).await?;
                    files += 1;
                }
            }
        }

        if files == 0 {
            return Err(Error::Registry(format!("No artifacts found under {:?}", remote_root)));
        }

        info!(
            "Downloaded {} files ({}) from {:?} in {:.2?}",
            files,
            format_bytes(total_bytes),
            remote_root,
            started.elapsed()
        );

        Ok(total_bytes)
    }

    /// Lists one artifact directory
    pub async fn list(&self, remote_dir: &str) -> Result<Vec<RemoteFile>> {
        let url = self.endpoint(&[]);

        let response = self
            .client
            .get(url)
            .query(&[("path", remote_dir)])
            .send()
            .await
            .map_err(transport_error)?;

        let listing: ListArtifactsResponse = ensure_success(response)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(listing.files)
    }

    /// Streams one file to `path`
    async fn download_file(&self, remote_path: &str, path: &Path) -> Result<u64> {
        let url = self.endpoint(&remote_path.split('/').collect::<Vec<_>>());
        let download_path = path.with_extension(match path.extension() {
            Some(ext) => format!("{}.download", ext.to_string_lossy()),
            None => "download".to_string(),
        });

        let response = self.client.get(url).send().await.map_err(transport_error)?;
        let response = ensure_success(response).await?;

        let total_size = response.content_length().unwrap_or(0);

        // Create file
        let mut file = File::create(&download_path).await?;

        // Download file in chunks
        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut last_update = Instant::now();

        while let Some(chunk_result) = stream.next().await {
            let chunk = match chunk_result {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&download_path).await;
                    return Err(transport_error(e));
                }
            };

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            // Report progress every 100ms
            if last_update.elapsed().as_millis() > 100 {
                debug!(
                    "Downloading {}: {} / {}",
                    remote_path,
                    format_bytes(downloaded),
                    format_bytes(total_size)
                );
                last_update = Instant::now();
            }
        }

        // Flush and close file
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&download_path, path).await?;

        debug!("Downloaded {} ({})", remote_path, format_bytes(downloaded));

        Ok(downloaded)
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(ARTIFACTS_ENDPOINT).extend(segments);
        }
        url
    }
}

fn transport_error(err: reqwest::Error) -> Error {
    Error::Registry(format!("Artifact transfer failed: {}", err))
}
