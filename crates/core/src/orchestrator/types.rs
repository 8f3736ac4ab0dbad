//! Types for recognition requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use super::error::OrchestratorError;

/// Extension of the notation document the pipeline writes.
pub const NOTATION_EXTENSION: &str = ".musicxml";

/// Suffix replacing [`NOTATION_EXTENSION`] for the teaser image.
pub const TEASER_SUFFIX: &str = "_teaser.png";

/// Image formats the pipeline accepts, by lowercase extension.
pub const SUPPORTED_IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// One inbound recognition request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionInput {
    /// Sheet music image on local storage.
    pub image: PathBuf,
    /// Skip the deskew preprocessing step.
    #[serde(default)]
    pub disable_deskew: bool,
}

impl PredictionInput {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            disable_deskew: false,
        }
    }

    pub fn without_deskew(mut self) -> Self {
        self.disable_deskew = true;
        self
    }
}

/// Call contract of the external pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRequest {
    pub img_path: PathBuf,
    /// Directory the notation document must end up in.
    pub output_path: PathBuf,
    /// Use the alternate inference backend.
    pub use_tf: bool,
    /// Persist intermediate recognition cache next to the image.
    pub save_cache: bool,
    pub without_deskew: bool,
}

impl PipelineRequest {
    /// Builds a request with the alternate backend and cache persistence off.
    pub fn new(
        img_path: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
        without_deskew: bool,
    ) -> Self {
        Self {
            img_path: img_path.into(),
            output_path: output_path.into(),
            use_tf: false,
            save_cache: false,
            without_deskew,
        }
    }

    /// File stem shared by every output of this request.
    pub fn stem(&self) -> String {
        self.img_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "output".to_string())
    }
}

/// Intermediate recognition data handed from the pipeline to the renderer.
///
/// Owned by exactly one request; anything it holds on disk is removed when
/// it is dropped.
#[derive(Debug, Default)]
pub struct RecognitionState {
    /// Image the state was produced from.
    pub source_image: PathBuf,
    /// Names of the recognition layers the backend populated.
    pub layers: Vec<String>,
    /// Preview image already drawn by the backend, if it produces one.
    pub preview_path: Option<PathBuf>,
    scratch: Option<TempDir>,
}

impl RecognitionState {
    pub fn new(source_image: impl Into<PathBuf>) -> Self {
        Self {
            source_image: source_image.into(),
            ..Default::default()
        }
    }

    pub fn with_layers(mut self, layers: Vec<String>) -> Self {
        self.layers = layers;
        self
    }

    pub fn with_preview(mut self, preview_path: impl Into<PathBuf>) -> Self {
        self.preview_path = Some(preview_path.into());
        self
    }

    /// Ties the lifetime of a scratch directory to this state.
    pub fn with_scratch(mut self, scratch: TempDir) -> Self {
        self.scratch = Some(scratch);
        self
    }

    pub fn scratch_dir(&self) -> Option<&Path> {
        self.scratch.as_ref().map(|s| s.path())
    }
}

/// Successful pipeline output.
#[derive(Debug)]
pub struct Extraction {
    /// Generated notation document.
    pub notation_path: PathBuf,
    pub state: RecognitionState,
}

/// PNG signature every teaser image starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Rendered teaser, encoded as PNG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeaserImage {
    pub width: u32,
    pub height: u32,
    pub png: Vec<u8>,
}

impl TeaserImage {
    /// Wraps encoded PNG bytes, reading dimensions from the IHDR chunk.
    pub fn from_png(png: Vec<u8>) -> Option<Self> {
        // signature (8) + chunk length (4) + "IHDR" (4) + width (4) + height (4)
        if png.len() < 24 || png[..8] != PNG_SIGNATURE || &png[12..16] != b"IHDR" {
            return None;
        }
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        Some(Self { width, height, png })
    }

    pub async fn save(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::write(path, &self.png).await
    }
}

/// Derives the teaser path from a notation path: `<dir>/<stem>.musicxml`
/// becomes `<dir>/<stem>_teaser.png`.
pub fn teaser_path_for(notation_path: &Path) -> Result<PathBuf, OrchestratorError> {
    let stem = notation_path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_suffix(NOTATION_EXTENSION))
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| OrchestratorError::NotationPath {
            path: notation_path.to_path_buf(),
        })?;

    Ok(notation_path.with_file_name(format!("{}{}", stem, TEASER_SUFFIX)))
}

/// Packaged outputs of one request.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutput {
    pub id: Uuid,
    pub notation_path: PathBuf,
    pub teaser_path: PathBuf,
    /// Request working directory; left in place for the caller.
    pub work_dir: PathBuf,
    pub completed_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl PredictionOutput {
    /// Ordered pair: notation document, then teaser image.
    pub fn paths(&self) -> [&Path; 2] {
        [&self.notation_path, &self.teaser_path]
    }

    pub fn into_paths(self) -> [PathBuf; 2] {
        [self.notation_path, self.teaser_path]
    }
}

/// Snapshot of orchestrator activity.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OrchestratorStatus {
    pub pipeline: String,
    pub renderer: String,
    /// A request currently holds the gate.
    pub busy: bool,
    pub total_processed: u64,
    pub total_failed: u64,
}
