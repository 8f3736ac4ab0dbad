use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::provisioner::ManifestEntry;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub checkpoints: CheckpointsConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    5000
}

/// How the provisioner decides that the checkpoint store is complete.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    /// Only the first manifest entry is checked; if it is missing, every
    /// entry is fetched again.
    #[default]
    Sentinel,
    /// Every destination is checked and only missing entries are fetched.
    All,
}

/// Checkpoint provisioning configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckpointsConfig {
    /// Root directory holding both checkpoint groups.
    ///
    /// Left unset, it resolves at startup to the `checkpoints` directory of
    /// the installed oemer package, which is where oemer loads weights from.
    #[serde(default)]
    pub root: Option<PathBuf>,
    /// Title prefix routing an artifact to `group_a_dir`.
    #[serde(default = "default_group_a_prefix")]
    pub group_a_prefix: String,
    #[serde(default = "default_group_a_dir")]
    pub group_a_dir: String,
    #[serde(default = "default_group_b_dir")]
    pub group_b_dir: String,
    #[serde(default)]
    pub verify: VerifyMode,
    /// Upper bound on bytes written per progress report.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Whole-transfer timeout per artifact in seconds.
    #[serde(default = "default_download_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Ordered manifest. The first entry is the sentinel.
    #[serde(default = "default_artifacts")]
    pub artifacts: Vec<ManifestEntry>,
}

impl CheckpointsConfig {
    /// Returns a copy rooted at `root`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }
}

impl Default for CheckpointsConfig {
    fn default() -> Self {
        Self {
            root: None,
            group_a_prefix: default_group_a_prefix(),
            group_a_dir: default_group_a_dir(),
            group_b_dir: default_group_b_dir(),
            verify: VerifyMode::default(),
            chunk_size: default_chunk_size(),
            timeout_secs: default_download_timeout(),
            user_agent: default_user_agent(),
            artifacts: default_artifacts(),
        }
    }
}

fn default_group_a_prefix() -> String {
    "1st".to_string()
}

fn default_group_a_dir() -> String {
    "unet_big".to_string()
}

fn default_group_b_dir() -> String {
    "seg_net".to_string()
}

fn default_chunk_size() -> usize {
    4096
}

fn default_download_timeout() -> u64 {
    3600 // 1 hour
}

fn default_user_agent() -> String {
    format!("scorebridge/{}", env!("CARGO_PKG_VERSION"))
}

const CHECKPOINTS_BASE_URL: &str = "https://github.com/BreezeWhite/oemer/releases/download/checkpoints";

fn default_artifacts() -> Vec<ManifestEntry> {
    ["1st_model.onnx", "1st_weights.h5", "2nd_model.onnx", "2nd_weights.h5"]
        .into_iter()
        .map(|title| ManifestEntry {
            title: title.to_string(),
            url: format!("{}/{}", CHECKPOINTS_BASE_URL, title),
        })
        .collect()
}

/// External recognition pipeline configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Path to the oemer executable.
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Python interpreter of the environment oemer is installed in.
    #[serde(default = "default_python")]
    pub python: PathBuf,
    /// Directory under which per-request working directories are created.
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,
    /// Timeout for a single recognition run in seconds.
    #[serde(default = "default_pipeline_timeout")]
    pub timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            python: default_python(),
            work_root: default_work_root(),
            timeout_secs: default_pipeline_timeout(),
        }
    }
}

fn default_executable() -> PathBuf {
    PathBuf::from("oemer")
}

fn default_python() -> PathBuf {
    PathBuf::from("python3")
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir().join("scorebridge")
}

fn default_pipeline_timeout() -> u64 {
    600
}

/// Sanitized config for API responses (artifact URLs reduced to titles)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub checkpoints: SanitizedCheckpointsConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedCheckpointsConfig {
    pub root: Option<PathBuf>,
    pub verify: VerifyMode,
    pub chunk_size: usize,
    pub timeout_secs: u64,
    pub artifacts: Vec<String>,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            checkpoints: SanitizedCheckpointsConfig {
                root: config.checkpoints.root.clone(),
                verify: config.checkpoints.verify,
                chunk_size: config.checkpoints.chunk_size,
                timeout_secs: config.checkpoints.timeout_secs,
                artifacts: config
                    .checkpoints
                    .artifacts
                    .iter()
                    .map(|a| a.title.clone())
                    .collect(),
            },
            pipeline: config.pipeline.clone(),
        }
    }
}
