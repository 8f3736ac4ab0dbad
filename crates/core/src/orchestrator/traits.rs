//! Trait definitions for the recognition collaborators.

use async_trait::async_trait;

use super::error::{OrchestratorError, PipelineError};
use super::types::{
    Extraction, OrchestratorStatus, PipelineRequest, PredictionInput, PredictionOutput,
    TeaserImage, SUPPORTED_IMAGE_FORMATS,
};

/// The external image-to-notation pipeline.
#[async_trait]
pub trait RecognitionPipeline: Send + Sync {
    /// Returns the name of this pipeline implementation.
    fn name(&self) -> &str;

    /// Clears any recognition state left behind by a previous request.
    ///
    /// Backends that keep no process-wide state can rely on the default.
    async fn reset(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Runs recognition, returning the notation document and the state the
    /// teaser renderer needs.
    async fn extract(&self, request: &PipelineRequest) -> Result<Extraction, PipelineError>;

    /// Validates that the pipeline is properly configured and ready.
    async fn validate(&self) -> Result<(), PipelineError>;

    /// Returns the supported input formats.
    fn supported_input_formats(&self) -> &[&str] {
        SUPPORTED_IMAGE_FORMATS
    }
}

/// Draws the teaser summarising a recognition result.
#[async_trait]
pub trait TeaserRenderer: Send + Sync {
    /// Returns the name of this renderer implementation.
    fn name(&self) -> &str;

    /// Renders from the state of a successful extraction.
    async fn render(&self, extraction: &Extraction) -> Result<TeaserImage, PipelineError>;
}

/// Object-safe entry point for serving recognition requests.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Runs one request to completion.
    async fn predict(&self, input: PredictionInput) -> Result<PredictionOutput, OrchestratorError>;

    fn status(&self) -> OrchestratorStatus;
}
