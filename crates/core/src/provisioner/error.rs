//! Error types for checkpoint provisioning.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while provisioning checkpoint artifacts.
///
/// Every variant is fatal to the provisioning run: nothing continues to the
/// next artifact once one of these is returned.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Manifest title does not encode a destination file name.
    #[error("Invalid artifact title '{title}': {reason}")]
    InvalidTitle { title: String, reason: String },

    /// No checkpoint root was configured or discovered.
    #[error("Checkpoint root is not resolved")]
    RootUnresolved,

    /// Manifest has no entries, so there is no sentinel.
    #[error("Artifact manifest is empty")]
    EmptyManifest,

    /// Connection or body read failed.
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    /// Server answered with a non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus { url: String, status: u16 },

    /// Local file could not be created or written.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Body length did not match the declared content length.
    #[error("Incomplete transfer for {title}: expected {expected} bytes, received {received}")]
    IncompleteTransfer {
        title: String,
        expected: u64,
        received: u64,
    },

    /// HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl ProvisionError {
    /// Creates a new invalid title error.
    pub fn invalid_title(title: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTitle {
            title: title.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new network error.
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new write error for the given path.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidTitle { .. } | Self::EmptyManifest | Self::RootUnresolved => "manifest",
            Self::Network { .. } => "network",
            Self::HttpStatus { .. } => "http_status",
            Self::Write { .. } => "write",
            Self::IncompleteTransfer { .. } => "incomplete",
            Self::Client(_) => "client",
        }
    }
}
