pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod provisioner;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, CheckpointsConfig, Config, ConfigError,
    PipelineConfig, SanitizedConfig, ServerConfig, VerifyMode,
};
pub use orchestrator::{
    CliTeaserRenderer, OemerCliPipeline, OrchestratorError, PipelineError, PredictionInput,
    PredictionOrchestrator, PredictionOutput, PredictionService, RecognitionPipeline,
    TeaserRenderer,
};
pub use provisioner::{
    ArtifactProvisioner, ArtifactSource, DownloadProgress, HttpArtifactSource, ManifestEntry,
    ProvisionError, ProvisionReport,
};
