use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scorebridge_core::{
    load_config, validate_config, ArtifactProvisioner, CliTeaserRenderer, DownloadProgress,
    HttpArtifactSource, OemerCliPipeline, PipelineError, PredictionOrchestrator,
    PredictionService, RecognitionPipeline,
};
use scorebridge_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Buffer size for the provisioning progress channel
const PROGRESS_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("scorebridge {}", VERSION);

    // Determine config path
    let config_path = std::env::var("SCOREBRIDGE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let mut config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Pipeline executable: {:?}", config.pipeline.executable);

    // Checkpoints go where oemer will load them from
    let pipeline = OemerCliPipeline::new(config.pipeline.clone());
    let checkpoint_root = match config.checkpoints.root.clone() {
        Some(root) => root,
        None => pipeline
            .checkpoint_dir()
            .await
            .context("Failed to locate the oemer checkpoint directory; set checkpoints.root")?,
    };
    info!("Checkpoint root: {:?}", checkpoint_root);
    config.checkpoints.root = Some(checkpoint_root.clone());

    // Check the recognition pipeline before downloading anything
    let pipeline = pipeline.with_checkpoint_root(checkpoint_root);
    match pipeline.validate().await {
        Ok(()) => info!("Recognition pipeline ready: {}", pipeline.name()),
        Err(e @ PipelineError::CheckpointMismatch { .. }) => {
            return Err(e).context("Checkpoints would be provisioned where oemer never reads them");
        }
        Err(e) => warn!("Recognition pipeline not ready: {}", e),
    }

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!("Config hash: {}", &config_hash[..16]);

    // Provision checkpoints before anything is served
    let source = HttpArtifactSource::from_config(&config.checkpoints)
        .context("Failed to create checkpoint HTTP client")?;
    let provisioner = ArtifactProvisioner::new(&config.checkpoints, source)
        .context("Invalid checkpoint manifest")?;

    let (progress_tx, progress_rx) = mpsc::channel(PROGRESS_BUFFER_SIZE);
    let reporter = tokio::spawn(report_progress(progress_rx));

    let report = provisioner
        .ensure_artifacts_with_progress(progress_tx)
        .await
        .context("Checkpoint provisioning failed")?;
    join_reporter(reporter).await;

    if report.skipped {
        info!("Checkpoints already present, skipping download");
    } else {
        info!(
            "Fetched {} checkpoints ({} bytes)",
            report.fetched.len(),
            report.bytes_downloaded
        );
    }

    let orchestrator: Arc<dyn PredictionService> = Arc::new(PredictionOrchestrator::new(
        &config.pipeline.work_root,
        pipeline,
        CliTeaserRenderer,
    ));
    info!("Request orchestrator initialized");

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        orchestrator,
        provisioner.sentinel().to_path_buf(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

/// Log chunk progress, at most once per whole percent per artifact.
async fn report_progress(mut progress_rx: mpsc::Receiver<DownloadProgress>) {
    let mut last_reported: HashMap<String, u64> = HashMap::new();

    while let Some(progress) = progress_rx.recv().await {
        match &progress {
            DownloadProgress::Chunk {
                title,
                percent: Some(percent),
                ..
            } => {
                let whole = percent.floor() as u64;
                if last_reported.get(title) != Some(&whole) {
                    last_reported.insert(title.clone(), whole);
                    info!("{}", progress.describe());
                }
            }
            // Start and completion are logged by the provisioner
            _ => {}
        }
    }
}

/// Waits for the progress reporter, returning whether it finished cleanly.
async fn join_reporter(reporter: JoinHandle<()>) -> bool {
    match reporter.await {
        Ok(()) => true,
        Err(e) => {
            warn!("Progress reporter stopped abnormally: {}", e);
            false
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
