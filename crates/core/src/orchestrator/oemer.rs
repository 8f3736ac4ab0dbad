//! oemer-backed recognition pipeline.
//!
//! Each run gets its own scratch directory inside the request's output
//! directory, so nothing recognised for one request is visible to the next.
//!
//! oemer loads its weights from `<MODULE_PATH>/checkpoints` of the installed
//! package and downloads them itself when they are missing, so provisioning
//! has to target that directory.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;

use super::error::PipelineError;
use super::traits::{RecognitionPipeline, TeaserRenderer};
use super::types::{
    Extraction, PipelineRequest, RecognitionState, TeaserImage, NOTATION_EXTENSION, TEASER_SUFFIX,
};

/// Maximum stderr bytes kept in a processing error.
const STDERR_TAIL_BYTES: usize = 4096;

/// Prints the install directory of the oemer package.
const MODULE_PATH_QUERY: &str = "import oemer; print(oemer.MODULE_PATH)";

/// Upper bound for the interpreter to import oemer.
const MODULE_PATH_TIMEOUT_SECS: u64 = 60;

/// Directory under `MODULE_PATH` that oemer loads weights from.
const CHECKPOINTS_DIR: &str = "checkpoints";

/// Runs the `oemer` command line tool as a subprocess.
#[derive(Debug, Clone)]
pub struct OemerCliPipeline {
    config: PipelineConfig,
    /// Where checkpoints were provisioned; checked against the install.
    checkpoint_root: Option<PathBuf>,
}

impl OemerCliPipeline {
    /// Creates a new pipeline with the given configuration.
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            checkpoint_root: None,
        }
    }

    /// Makes [`validate`](RecognitionPipeline::validate) require that oemer
    /// loads its weights from `root`.
    pub fn with_checkpoint_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.checkpoint_root = Some(root.into());
        self
    }

    pub fn checkpoint_root(&self) -> Option<&Path> {
        self.checkpoint_root.as_deref()
    }

    /// Asks the configured interpreter where oemer is installed and returns
    /// the checkpoint directory oemer reads.
    pub async fn checkpoint_dir(&self) -> Result<PathBuf, PipelineError> {
        let query = Command::new(&self.config.python)
            .args(["-c", MODULE_PATH_QUERY])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(Duration::from_secs(MODULE_PATH_TIMEOUT_SECS), query).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    PipelineError::ExecutableNotFound {
                        path: self.config.python.clone(),
                    }
                } else {
                    PipelineError::Io(e)
                }
            })?,
            Err(_) => {
                return Err(PipelineError::Timeout {
                    timeout_secs: MODULE_PATH_TIMEOUT_SECS,
                })
            }
        };

        if !output.status.success() {
            return Err(PipelineError::processing_failed(
                format!("{:?} cannot import oemer", self.config.python),
                stderr_tail(&output.stderr),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let module_path = stdout.trim();
        if module_path.is_empty() {
            return Err(PipelineError::processing_failed(
                "oemer reported an empty MODULE_PATH",
                None,
            ));
        }

        let dir = Path::new(module_path).join(CHECKPOINTS_DIR);
        debug!("oemer checkpoint directory: {:?}", dir);
        Ok(dir)
    }

    /// Creates a pipeline with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PipelineConfig::default())
    }

    pub fn executable(&self) -> &Path {
        &self.config.executable
    }

    /// Builds oemer arguments, writing into `scratch`.
    fn build_args(request: &PipelineRequest, scratch: &Path) -> Vec<String> {
        let mut args = vec![
            request.img_path.to_string_lossy().to_string(),
            "-o".to_string(),
            scratch.to_string_lossy().to_string(),
        ];

        if request.use_tf {
            args.push("--use-tf".to_string());
        }
        if request.save_cache {
            args.push("--save-cache".to_string());
        }
        if request.without_deskew {
            args.push("--without-deskew".to_string());
        }

        args
    }

    fn map_spawn_error(&self, e: std::io::Error) -> PipelineError {
        if e.kind() == std::io::ErrorKind::NotFound {
            PipelineError::ExecutableNotFound {
                path: self.config.executable.clone(),
            }
        } else {
            PipelineError::Io(e)
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let start = text
        .char_indices()
        .map(|(i, _)| i)
        .find(|i| text.len() - i <= STDERR_TAIL_BYTES)
        .unwrap_or(0);
    Some(text[start..].to_string())
}

#[async_trait]
impl RecognitionPipeline for OemerCliPipeline {
    fn name(&self) -> &str {
        "oemer"
    }

    async fn extract(&self, request: &PipelineRequest) -> Result<Extraction, PipelineError> {
        let start = Instant::now();
        let scratch = tempfile::Builder::new()
            .prefix(".oemer-")
            .tempdir_in(&request.output_path)?;

        let args = Self::build_args(request, scratch.path());
        debug!("Running {:?} {:?}", self.config.executable, args);

        let child = Command::new(&self.config.executable)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.map_spawn_error(e))?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout(
            Duration::from_secs(self.config.timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    "oemer timed out after {}s on {:?}",
                    self.config.timeout_secs, request.img_path
                );
                return Err(PipelineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        if !output.status.success() {
            return Err(PipelineError::processing_failed(
                format!("oemer exited with code: {:?}", output.status.code()),
                stderr_tail(&output.stderr),
            ));
        }

        let stem = request.stem();
        let produced = scratch.path().join(format!("{}{}", stem, NOTATION_EXTENSION));
        if !produced.exists() {
            return Err(PipelineError::OutputMissing { path: produced });
        }

        let notation_path = request
            .output_path
            .join(format!("{}{}", stem, NOTATION_EXTENSION));
        tokio::fs::rename(&produced, &notation_path).await?;

        let mut state = RecognitionState::new(&request.img_path);
        let preview = scratch.path().join(format!("{}{}", stem, TEASER_SUFFIX));
        if preview.exists() {
            state = state.with_preview(preview);
        }

        info!(
            "oemer recognised {:?} in {} ms",
            request.img_path,
            start.elapsed().as_millis()
        );

        Ok(Extraction {
            notation_path,
            state: state.with_scratch(scratch),
        })
    }

    async fn validate(&self) -> Result<(), PipelineError> {
        let output = Command::new(&self.config.executable)
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.map_spawn_error(e))?;

        if !output.status.success() {
            return Err(PipelineError::processing_failed(
                "oemer --help failed",
                stderr_tail(&output.stderr),
            ));
        }

        if let Some(configured) = &self.checkpoint_root {
            let expected = self.checkpoint_dir().await?;
            if !same_dir(configured, &expected) {
                return Err(PipelineError::CheckpointMismatch {
                    configured: configured.clone(),
                    expected,
                });
            }
        }

        tokio::fs::create_dir_all(&self.config.work_root).await?;
        Ok(())
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Loads the preview image oemer draws next to its notation output.
#[derive(Debug, Clone, Default)]
pub struct CliTeaserRenderer;

#[async_trait]
impl TeaserRenderer for CliTeaserRenderer {
    fn name(&self) -> &str {
        "oemer-preview"
    }

    async fn render(&self, extraction: &Extraction) -> Result<TeaserImage, PipelineError> {
        let preview: &PathBuf = extraction
            .state
            .preview_path
            .as_ref()
            .ok_or_else(|| PipelineError::render("pipeline produced no preview image"))?;

        let png = tokio::fs::read(preview).await?;
        TeaserImage::from_png(png)
            .ok_or_else(|| PipelineError::render(format!("{:?} is not a PNG image", preview)))
    }
}
