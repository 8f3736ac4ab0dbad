//! Prediction orchestrator implementation.
//!
//! Drives one request through the fixed sequence:
//! reset → stage → build request → extract → render teaser → persist → package.
//! A request gate keeps the whole sequence exclusive, so a second request's
//! reset can never land between another request's extract and render.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::metrics::{PREDICTIONS_TOTAL, PREDICTION_DURATION};

use super::error::{OrchestratorError, PipelineError};
use super::traits::{PredictionService, RecognitionPipeline, TeaserRenderer};
use super::types::{
    teaser_path_for, OrchestratorStatus, PipelineRequest, PredictionInput, PredictionOutput,
};

/// Prefix of per-request working directories.
const WORK_DIR_PREFIX: &str = "pred-";

/// Runs recognition requests one at a time against a pipeline and renderer.
pub struct PredictionOrchestrator<P: RecognitionPipeline, R: TeaserRenderer> {
    work_root: PathBuf,
    pipeline: P,
    renderer: R,
    gate: Mutex<()>,
    total_processed: AtomicU64,
    total_failed: AtomicU64,
}

impl<P: RecognitionPipeline, R: TeaserRenderer> PredictionOrchestrator<P, R> {
    /// Creates an orchestrator staging request directories under `work_root`.
    pub fn new(work_root: impl Into<PathBuf>, pipeline: P, renderer: R) -> Self {
        Self {
            work_root: work_root.into(),
            pipeline,
            renderer,
            gate: Mutex::new(()),
            total_processed: AtomicU64::new(0),
            total_failed: AtomicU64::new(0),
        }
    }

    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    pub fn status(&self) -> OrchestratorStatus {
        OrchestratorStatus {
            pipeline: self.pipeline.name().to_string(),
            renderer: self.renderer.name().to_string(),
            busy: self.gate.try_lock().is_err(),
            total_processed: self.total_processed.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }

    /// Runs one recognition request and returns its packaged outputs.
    pub async fn predict(&self, input: PredictionInput) -> Result<PredictionOutput, OrchestratorError> {
        let start = Instant::now();
        let id = Uuid::new_v4();

        let result = match self.check_input(&input.image) {
            Ok(()) => {
                let _guard = self.gate.lock().await;
                self.run_exclusive(id, &input).await
            }
            Err(e) => Err(e.into()),
        };

        let elapsed = start.elapsed();
        self.total_processed.fetch_add(1, Ordering::Relaxed);

        match result {
            Ok((notation_path, teaser_path, work_dir)) => {
                PREDICTIONS_TOTAL.with_label_values(&["success"]).inc();
                PREDICTION_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed.as_secs_f64());
                info!(
                    "Prediction {} finished in {} ms: {:?}",
                    id,
                    elapsed.as_millis(),
                    notation_path
                );
                Ok(PredictionOutput {
                    id,
                    notation_path,
                    teaser_path,
                    work_dir,
                    completed_at: Utc::now(),
                    duration_ms: elapsed.as_millis() as u64,
                })
            }
            Err(e) => {
                self.total_failed.fetch_add(1, Ordering::Relaxed);
                PREDICTIONS_TOTAL.with_label_values(&[e.kind()]).inc();
                PREDICTION_DURATION
                    .with_label_values(&["failure"])
                    .observe(elapsed.as_secs_f64());
                warn!("Prediction {} failed: {}", id, e);
                Err(e)
            }
        }
    }

    fn check_input(&self, image: &Path) -> Result<(), PipelineError> {
        if !image.is_file() {
            return Err(PipelineError::InputNotFound {
                path: image.to_path_buf(),
            });
        }

        let format = image
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if !self
            .pipeline
            .supported_input_formats()
            .contains(&format.as_str())
        {
            return Err(PipelineError::UnsupportedInput {
                format: if format.is_empty() {
                    "unknown".to_string()
                } else {
                    format
                },
            });
        }

        Ok(())
    }

    /// Steps that must not interleave with another request. Caller holds the gate.
    async fn run_exclusive(
        &self,
        id: Uuid,
        input: &PredictionInput,
    ) -> Result<(PathBuf, PathBuf, PathBuf), OrchestratorError> {
        debug!("[{}] reset", id);
        self.pipeline.reset().await?;

        debug!("[{}] stage", id);
        let work_dir = self.stage()?;

        let request = PipelineRequest::new(&input.image, &work_dir, input.disable_deskew);
        debug!("[{}] extract {:?}", id, request);
        let extraction = self.pipeline.extract(&request).await?;

        debug!("[{}] render teaser", id);
        let teaser = self.renderer.render(&extraction).await?;

        let teaser_path = teaser_path_for(&extraction.notation_path)?;
        teaser
            .save(&teaser_path)
            .await
            .map_err(|source| OrchestratorError::TeaserWrite {
                path: teaser_path.clone(),
                source,
            })?;
        debug!(
            "[{}] teaser {}x{} written to {:?}",
            id, teaser.width, teaser.height, teaser_path
        );

        Ok((extraction.notation_path, teaser_path, work_dir))
    }

    /// Creates a fresh, uniquely named working directory that outlives the request.
    fn stage(&self) -> Result<PathBuf, OrchestratorError> {
        let staging_error = |source| OrchestratorError::Staging {
            path: self.work_root.clone(),
            source,
        };

        std::fs::create_dir_all(&self.work_root).map_err(staging_error)?;
        let dir = tempfile::Builder::new()
            .prefix(WORK_DIR_PREFIX)
            .tempdir_in(&self.work_root)
            .map_err(staging_error)?;

        Ok(dir.keep())
    }
}

#[async_trait]
impl<P, R> PredictionService for PredictionOrchestrator<P, R>
where
    P: RecognitionPipeline + 'static,
    R: TeaserRenderer + 'static,
{
    async fn predict(&self, input: PredictionInput) -> Result<PredictionOutput, OrchestratorError> {
        PredictionOrchestrator::predict(self, input).await
    }

    fn status(&self) -> OrchestratorStatus {
        PredictionOrchestrator::status(self)
    }
}
