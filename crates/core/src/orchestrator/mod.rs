//! Recognition request orchestration.
//!
//! Turns one inbound request into a call against the external recognition
//! pipeline, renders the teaser from the state that call returned, and
//! packages both files for the caller.
//!
//! The recognition state travels explicitly from [`RecognitionPipeline::extract`]
//! to [`TeaserRenderer::render`] inside an [`Extraction`]; requests are still
//! serialized through a gate because backends may hold process-wide state
//! that [`RecognitionPipeline::reset`] clears.
//!
//! # Example
//!
//! ```ignore
//! use scorebridge_core::orchestrator::{
//!     CliTeaserRenderer, OemerCliPipeline, PredictionInput, PredictionOrchestrator,
//! };
//!
//! let pipeline = OemerCliPipeline::new(config.pipeline.clone());
//! let orchestrator =
//!     PredictionOrchestrator::new(&config.pipeline.work_root, pipeline, CliTeaserRenderer);
//!
//! let output = orchestrator.predict(PredictionInput::new("A.png")).await?;
//! let [notation, teaser] = output.into_paths();
//! ```

mod error;
mod oemer;
mod runner;
mod traits;
mod types;

pub use error::{OrchestratorError, PipelineError};
pub use oemer::{CliTeaserRenderer, OemerCliPipeline};
pub use runner::PredictionOrchestrator;
pub use traits::{PredictionService, RecognitionPipeline, TeaserRenderer};
pub use types::{
    teaser_path_for, Extraction, OrchestratorStatus, PipelineRequest, PredictionInput,
    PredictionOutput, RecognitionState, TeaserImage, NOTATION_EXTENSION, PNG_SIGNATURE,
    SUPPORTED_IMAGE_FORMATS, TEASER_SUFFIX,
};
