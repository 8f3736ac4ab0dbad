//! Progress and report types for provisioning.

use serde::Serialize;

/// Progress update emitted while checkpoints are fetched.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DownloadProgress {
    /// An artifact fetch is about to begin.
    Started {
        title: String,
        /// 1-based position in the pending list.
        index: usize,
        total: usize,
        url: String,
    },
    /// A chunk was written to disk.
    Chunk {
        title: String,
        bytes_written: u64,
        /// Declared content length, if the server sent one.
        total_bytes: Option<u64>,
        /// Percent complete with one decimal place; `None` when the
        /// content length is unknown.
        percent: Option<f64>,
    },
    /// The artifact is complete and in place.
    Completed { title: String, bytes_written: u64 },
}

impl DownloadProgress {
    pub fn title(&self) -> &str {
        match self {
            Self::Started { title, .. } | Self::Chunk { title, .. } | Self::Completed { title, .. } => {
                title
            }
        }
    }

    /// One-line rendering for logs, e.g. `1st_model.onnx: 42.5%`.
    pub fn describe(&self) -> String {
        match self {
            Self::Started {
                title,
                index,
                total,
                ..
            } => format!("Downloading checkpoint ({}/{}): {}", index, total, title),
            Self::Chunk {
                title,
                percent: Some(percent),
                ..
            } => format!("{}: {:.1}%", title, percent),
            Self::Chunk {
                title,
                bytes_written,
                ..
            } => format!("{}: {} bytes", title, bytes_written),
            Self::Completed { title, .. } => format!("{}: Complete", title),
        }
    }
}

/// Percent of `written` over `total`, rounded to one decimal and capped at 100.
///
/// Returns `None` when the total is unknown or zero.
pub fn percent_complete(written: u64, total: Option<u64>) -> Option<f64> {
    let total = total.filter(|t| *t > 0)?;
    let percent = (written as f64 * 1000.0 / total as f64).round() / 10.0;
    Some(percent.min(100.0))
}

/// Summary of one provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProvisionReport {
    /// True when every required artifact was already present.
    pub skipped: bool,
    /// Titles fetched during this run, in fetch order.
    pub fetched: Vec<String>,
    pub bytes_downloaded: u64,
    pub duration_ms: u64,
}
