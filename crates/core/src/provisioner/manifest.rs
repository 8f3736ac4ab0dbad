//! Artifact manifest and the mapping from titles to local destinations.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::CheckpointsConfig;

use super::error::ProvisionError;

/// Separates the group prefix from the file name in an artifact title.
const TITLE_DELIMITER: char = '_';

/// One manifest entry: an artifact title and where to fetch it from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Encodes the destination group (prefix) and file name (after `_`).
    pub title: String,
    /// Remote location of the artifact.
    pub url: String,
}

impl ManifestEntry {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Destination group of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactGroup {
    /// Titles starting with the configured group A prefix.
    A,
    /// Everything else.
    B,
}

/// A manifest entry with its local destination resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub title: String,
    pub url: String,
    pub group: ArtifactGroup,
    pub destination: PathBuf,
}

impl ResolvedArtifact {
    /// Whether the artifact is present on local storage.
    pub fn is_present(&self) -> bool {
        self.destination.exists()
    }
}

/// Maps artifact titles onto the two checkpoint directories.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
    group_a_prefix: String,
    group_a_dir: String,
    group_b_dir: String,
}

impl ArtifactLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        group_a_prefix: impl Into<String>,
        group_a_dir: impl Into<String>,
        group_b_dir: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            group_a_prefix: group_a_prefix.into(),
            group_a_dir: group_a_dir.into(),
            group_b_dir: group_b_dir.into(),
        }
    }

    /// Builds the layout of a config whose root has been resolved.
    pub fn from_config(config: &CheckpointsConfig) -> Result<Self, ProvisionError> {
        let root = config.root.clone().ok_or(ProvisionError::RootUnresolved)?;
        Ok(Self::new(
            root,
            config.group_a_prefix.clone(),
            config.group_a_dir.clone(),
            config.group_b_dir.clone(),
        ))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn group_for(&self, title: &str) -> ArtifactGroup {
        if title.starts_with(&self.group_a_prefix) {
            ArtifactGroup::A
        } else {
            ArtifactGroup::B
        }
    }

    pub fn group_dir(&self, group: ArtifactGroup) -> PathBuf {
        match group {
            ArtifactGroup::A => self.root.join(&self.group_a_dir),
            ArtifactGroup::B => self.root.join(&self.group_b_dir),
        }
    }

    /// Extracts the destination file name: the text after the first `_`.
    pub fn file_name(title: &str) -> Result<&str, ProvisionError> {
        let (_, name) = title
            .split_once(TITLE_DELIMITER)
            .ok_or_else(|| ProvisionError::invalid_title(title, "missing '_' delimiter"))?;

        if name.is_empty() {
            return Err(ProvisionError::invalid_title(title, "empty file name"));
        }
        if name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ProvisionError::invalid_title(
                title,
                "file name must not contain path components",
            ));
        }
        Ok(name)
    }

    pub fn destination(&self, title: &str) -> Result<PathBuf, ProvisionError> {
        let name = Self::file_name(title)?;
        Ok(self.group_dir(self.group_for(title)).join(name))
    }

    /// Checks that the manifest has a sentinel and every title names a file.
    pub fn check_manifest(entries: &[ManifestEntry]) -> Result<(), ProvisionError> {
        if entries.is_empty() {
            return Err(ProvisionError::EmptyManifest);
        }
        for entry in entries {
            Self::file_name(&entry.title)?;
        }
        Ok(())
    }

    /// Resolves every entry in manifest order.
    pub fn resolve(&self, entries: &[ManifestEntry]) -> Result<Vec<ResolvedArtifact>, ProvisionError> {
        Self::check_manifest(entries)?;

        entries
            .iter()
            .map(|entry| {
                Ok(ResolvedArtifact {
                    title: entry.title.clone(),
                    url: entry.url.clone(),
                    group: self.group_for(&entry.title),
                    destination: self.destination(&entry.title)?,
                })
            })
            .collect()
    }
}
