use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use scorebridge_core::{Config, PredictionService, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    predictor: Arc<dyn PredictionService>,
    /// Checkpoint whose presence marks the store as provisioned.
    sentinel: PathBuf,
    started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: Config, predictor: Arc<dyn PredictionService>, sentinel: PathBuf) -> Self {
        Self {
            config,
            predictor,
            sentinel,
            started_at: Utc::now(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn predictor(&self) -> &dyn PredictionService {
        self.predictor.as_ref()
    }

    pub fn sentinel(&self) -> &Path {
        &self.sentinel
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Directory holding uploaded images while they are recognised.
    pub fn upload_dir(&self) -> PathBuf {
        self.config.pipeline.work_root.join("uploads")
    }
}
