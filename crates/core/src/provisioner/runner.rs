//! Checkpoint provisioner implementation.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{CheckpointsConfig, VerifyMode};
use crate::metrics::{ARTIFACT_BYTES, ARTIFACT_DOWNLOADS};

use super::error::ProvisionError;
use super::manifest::{ArtifactLayout, ResolvedArtifact};
use super::traits::ArtifactSource;
use super::types::{percent_complete, DownloadProgress, ProvisionReport};

/// Ensures every checkpoint in the manifest exists locally before inference.
pub struct ArtifactProvisioner<S: ArtifactSource> {
    source: S,
    layout: ArtifactLayout,
    artifacts: Vec<ResolvedArtifact>,
    verify: VerifyMode,
    chunk_size: usize,
}

impl<S: ArtifactSource> ArtifactProvisioner<S> {
    /// Creates a provisioner, resolving every manifest entry up front.
    pub fn new(config: &CheckpointsConfig, source: S) -> Result<Self, ProvisionError> {
        let layout = ArtifactLayout::from_config(config)?;
        let artifacts = layout.resolve(&config.artifacts)?;

        Ok(Self {
            source,
            layout,
            artifacts,
            verify: config.verify,
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Resolved artifacts in manifest order.
    pub fn artifacts(&self) -> &[ResolvedArtifact] {
        &self.artifacts
    }

    /// The artifact whose presence stands in for the whole set.
    pub fn sentinel(&self) -> &Path {
        // resolve() rejects empty manifests
        &self.artifacts[0].destination
    }

    /// Artifacts the next provisioning run would fetch.
    pub fn pending(&self) -> Vec<&ResolvedArtifact> {
        match self.verify {
            VerifyMode::Sentinel => {
                if self.sentinel().exists() {
                    Vec::new()
                } else {
                    self.artifacts.iter().collect()
                }
            }
            VerifyMode::All => self.artifacts.iter().filter(|a| !a.is_present()).collect(),
        }
    }

    /// Whether inference can run without fetching anything.
    pub fn is_ready(&self) -> bool {
        self.pending().is_empty()
    }

    /// Fetches missing checkpoints.
    pub async fn ensure_artifacts(&self) -> Result<ProvisionReport, ProvisionError> {
        self.run(None).await
    }

    /// Fetches missing checkpoints with progress reporting.
    ///
    /// If the receiver is dropped, provisioning continues without progress.
    pub async fn ensure_artifacts_with_progress(
        &self,
        progress_tx: mpsc::Sender<DownloadProgress>,
    ) -> Result<ProvisionReport, ProvisionError> {
        self.run(Some(progress_tx)).await
    }

    async fn run(
        &self,
        progress_tx: Option<mpsc::Sender<DownloadProgress>>,
    ) -> Result<ProvisionReport, ProvisionError> {
        let start = Instant::now();
        let pending = self.pending();

        if pending.is_empty() {
            info!("Checkpoints present under {:?}", self.layout.root());
            return Ok(ProvisionReport {
                skipped: true,
                ..Default::default()
            });
        }

        info!(
            "Downloading model checkpoints ({} of {} artifacts)...",
            pending.len(),
            self.artifacts.len()
        );

        let mut report = ProvisionReport::default();
        let total = pending.len();
        let sentinel = self.sentinel();
        // Sentinel body stays staged until the rest of the set is on disk.
        let mut staged_sentinel: Option<PathBuf> = None;

        for (idx, artifact) in pending.into_iter().enumerate() {
            let started = DownloadProgress::Started {
                title: artifact.title.clone(),
                index: idx + 1,
                total,
                url: artifact.url.clone(),
            };
            info!("{}", started.describe());
            send(progress_tx.as_ref(), started).await;

            let fetched = if artifact.destination == sentinel {
                self.fetch_part(
                    &artifact.title,
                    &artifact.url,
                    &artifact.destination,
                    progress_tx.as_ref(),
                )
                .await
                .map(|(part, bytes)| {
                    staged_sentinel = Some(part);
                    bytes
                })
            } else {
                self.download_file(
                    &artifact.title,
                    &artifact.url,
                    &artifact.destination,
                    progress_tx.as_ref(),
                )
                .await
            };

            let bytes = match fetched {
                Ok(bytes) => bytes,
                Err(e) => {
                    error!("Provisioning aborted at {}: {}", artifact.title, e);
                    if let Some(part) = staged_sentinel.take() {
                        remove_part(&part).await;
                    }
                    return Err(e);
                }
            };

            report.fetched.push(artifact.title.clone());
            report.bytes_downloaded += bytes;
        }

        if let Some(part) = staged_sentinel {
            if let Err(e) = commit(&part, sentinel).await {
                remove_part(&part).await;
                return Err(e);
            }
            debug!("Sentinel {:?} committed", sentinel);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Checkpoints downloaded successfully ({} bytes in {} ms)",
            report.bytes_downloaded, report.duration_ms
        );
        Ok(report)
    }

    /// Streams one artifact to `destination`, returning the bytes written.
    ///
    /// The body lands in a `.part` sibling first and is renamed into place
    /// only once the whole transfer succeeded.
    pub async fn download_file(
        &self,
        title: &str,
        url: &str,
        destination: &Path,
        progress_tx: Option<&mpsc::Sender<DownloadProgress>>,
    ) -> Result<u64, ProvisionError> {
        let (part, written) = self.fetch_part(title, url, destination, progress_tx).await?;
        if let Err(e) = commit(&part, destination).await {
            remove_part(&part).await;
            return Err(e);
        }
        Ok(written)
    }

    /// Streams one artifact into its `.part` sibling without committing it.
    async fn fetch_part(
        &self,
        title: &str,
        url: &str,
        destination: &Path,
        progress_tx: Option<&mpsc::Sender<DownloadProgress>>,
    ) -> Result<(PathBuf, u64), ProvisionError> {
        let part_path = part_path(destination);

        let result = self
            .stream_to(title, url, destination, &part_path, progress_tx)
            .await;

        match result {
            Ok(written) => {
                ARTIFACT_DOWNLOADS.with_label_values(&["success"]).inc();
                ARTIFACT_BYTES.inc_by(written);
                send(
                    progress_tx,
                    DownloadProgress::Completed {
                        title: title.to_string(),
                        bytes_written: written,
                    },
                )
                .await;
                info!("{}: Complete ({} bytes)", title, written);
                Ok((part_path, written))
            }
            Err(e) => {
                ARTIFACT_DOWNLOADS.with_label_values(&[e.kind()]).inc();
                remove_part(&part_path).await;
                Err(e)
            }
        }
    }

    async fn stream_to(
        &self,
        title: &str,
        url: &str,
        destination: &Path,
        part_path: &Path,
        progress_tx: Option<&mpsc::Sender<DownloadProgress>>,
    ) -> Result<u64, ProvisionError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ProvisionError::write(parent, e))?;
        }

        let mut stream = self.source.open(url).await?;
        let declared = stream.content_length();
        debug!("{}: declared length {:?}", title, declared);

        let mut file = File::create(part_path)
            .await
            .map_err(|e| ProvisionError::write(part_path, e))?;
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next_chunk().await? {
            for piece in chunk.chunks(self.chunk_size) {
                file.write_all(piece)
                    .await
                    .map_err(|e| ProvisionError::write(part_path, e))?;
                written += piece.len() as u64;

                let progress = DownloadProgress::Chunk {
                    title: title.to_string(),
                    bytes_written: written,
                    total_bytes: declared,
                    percent: percent_complete(written, declared),
                };
                debug!("{}", progress.describe());
                send(progress_tx, progress).await;
            }
        }

        if let Some(expected) = declared {
            if written != expected {
                return Err(ProvisionError::IncompleteTransfer {
                    title: title.to_string(),
                    expected,
                    received: written,
                });
            }
        }

        file.flush()
            .await
            .map_err(|e| ProvisionError::write(part_path, e))?;

        Ok(written)
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

async fn commit(part_path: &Path, destination: &Path) -> Result<(), ProvisionError> {
    fs::rename(part_path, destination)
        .await
        .map_err(|e| ProvisionError::write(destination, e))
}

async fn remove_part(part_path: &Path) {
    if let Err(e) = fs::remove_file(part_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove partial file {:?}: {}", part_path, e);
        }
    }
}

async fn send(progress_tx: Option<&mpsc::Sender<DownloadProgress>>, progress: DownloadProgress) {
    if let Some(tx) = progress_tx {
        let _ = tx.send(progress).await;
    }
}
