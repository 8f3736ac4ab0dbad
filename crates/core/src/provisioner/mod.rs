//! Checkpoint provisioning.
//!
//! Makes sure the model checkpoints named in the manifest exist on local
//! storage before the first recognition request is served. Artifacts are
//! streamed one at a time, in manifest order, with per-chunk progress.
//!
//! Presence is decided by a sentinel (the first manifest entry) unless the
//! provisioner is configured to verify every artifact.
//!
//! # Example
//!
//! ```ignore
//! use scorebridge_core::provisioner::{ArtifactProvisioner, HttpArtifactSource};
//! use scorebridge_core::CheckpointsConfig;
//!
//! let config = CheckpointsConfig::default();
//! let source = HttpArtifactSource::from_config(&config)?;
//! let provisioner = ArtifactProvisioner::new(&config, source)?;
//!
//! let (progress_tx, mut progress_rx) = tokio::sync::mpsc::channel(256);
//! tokio::spawn(async move {
//!     while let Some(progress) = progress_rx.recv().await {
//!         println!("{}", progress.describe());
//!     }
//! });
//!
//! let report = provisioner.ensure_artifacts_with_progress(progress_tx).await?;
//! println!("Fetched {} artifacts", report.fetched.len());
//! ```

mod error;
mod http;
mod manifest;
mod runner;
mod traits;
mod types;

pub use error::ProvisionError;
pub use http::HttpArtifactSource;
pub use manifest::{ArtifactGroup, ArtifactLayout, ManifestEntry, ResolvedArtifact};
pub use runner::ArtifactProvisioner;
pub use traits::{ArtifactSource, ArtifactStream};
pub use types::{percent_complete, DownloadProgress, ProvisionReport};
