//! Error types for recognition requests.

use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by the external recognition pipeline or teaser renderer.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input image does not exist.
    #[error("Input image not found: {path}")]
    InputNotFound { path: PathBuf },

    /// Input image is not a format the pipeline accepts.
    #[error("Unsupported input format: {format}")]
    UnsupportedInput { format: String },

    /// Pipeline executable could not be found.
    #[error("Pipeline executable not found at path: {path}")]
    ExecutableNotFound { path: PathBuf },

    /// Checkpoints are provisioned somewhere the pipeline never reads.
    #[error("Checkpoint root {configured} is not the pipeline's checkpoint directory {expected}")]
    CheckpointMismatch {
        configured: PathBuf,
        expected: PathBuf,
    },

    /// Pipeline ran but rejected or could not process the input.
    #[error("Recognition failed: {reason}")]
    ProcessingFailed {
        reason: String,
        stderr: Option<String>,
    },

    /// Pipeline did not finish in time.
    #[error("Recognition timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Pipeline reported success without producing its output.
    #[error("Expected pipeline output not found: {path}")]
    OutputMissing { path: PathBuf },

    /// Teaser could not be rendered from the recognition state.
    #[error("Failed to render teaser: {reason}")]
    Render { reason: String },

    /// I/O error while driving the pipeline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Creates a new processing failed error with stderr output.
    pub fn processing_failed(reason: impl Into<String>, stderr: Option<String>) -> Self {
        Self::ProcessingFailed {
            reason: reason.into(),
            stderr,
        }
    }

    /// Creates a new render error.
    pub fn render(reason: impl Into<String>) -> Self {
        Self::Render {
            reason: reason.into(),
        }
    }

    /// Whether the caller's input caused this failure.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            Self::InputNotFound { .. } | Self::UnsupportedInput { .. } | Self::ProcessingFailed { .. }
        )
    }
}

/// Errors that end a single recognition request.
///
/// None of these affect later requests.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Per-request working directory could not be created.
    #[error("Failed to stage working directory under {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline or renderer failure.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Notation file path does not carry the expected extension.
    #[error("Cannot derive teaser path from {path}: expected a .musicxml file")]
    NotationPath { path: PathBuf },

    /// Teaser image could not be written.
    #[error("Failed to write teaser to {path}: {source}")]
    TeaserWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrchestratorError {
    /// Whether the caller's input caused this failure, as opposed to an
    /// internal fault.
    pub fn is_bad_input(&self) -> bool {
        match self {
            Self::Pipeline(e) => e.is_bad_input(),
            _ => false,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Staging { .. } => "staging",
            Self::Pipeline(e) if e.is_bad_input() => "bad_input",
            Self::Pipeline(_) => "pipeline",
            Self::NotationPath { .. } | Self::TeaserWrite { .. } => "packaging",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_input_classification() {
        let err = OrchestratorError::from(PipelineError::UnsupportedInput {
            format: "bmp".to_string(),
        });
        assert!(err.is_bad_input());
        assert_eq!(err.kind(), "bad_input");

        let err = OrchestratorError::from(PipelineError::processing_failed("no staff lines", None));
        assert!(err.is_bad_input());
    }

    #[test]
    fn test_internal_classification() {
        let err = OrchestratorError::from(PipelineError::Timeout { timeout_secs: 5 });
        assert!(!err.is_bad_input());
        assert_eq!(err.kind(), "pipeline");

        let err = OrchestratorError::Staging {
            path: PathBuf::from("/nope"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(!err.is_bad_input());
        assert_eq!(err.kind(), "staging");
    }
}
