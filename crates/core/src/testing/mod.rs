//! Testing utilities and mock implementations.
//!
//! Mocks for every external collaborator, so provisioning and prediction can
//! be exercised end to end without network access or the recognition tool.
//!
//! # Example
//!
//! ```rust,ignore
//! use scorebridge_core::testing::{MockArtifactSource, MockRecognitionPipeline, MockTeaserRenderer};
//!
//! let source = MockArtifactSource::new();
//! source.set_body("https://host/1st_model.onnx", vec![0u8; 128]).await;
//!
//! let orchestrator = PredictionOrchestrator::new(
//!     work_root,
//!     MockRecognitionPipeline::new(),
//!     MockTeaserRenderer::new(),
//! );
//! ```

mod mock_pipeline;
mod mock_renderer;
mod mock_source;

pub use mock_pipeline::MockRecognitionPipeline;
pub use mock_renderer::MockTeaserRenderer;
pub use mock_source::MockArtifactSource;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::path::{Path, PathBuf};

    use crate::config::CheckpointsConfig;
    use crate::orchestrator::PNG_SIGNATURE;
    use crate::provisioner::ManifestEntry;

    /// Signature plus an IHDR chunk for an 8-bit RGBA image.
    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&13u32.to_be_bytes());
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&width.to_be_bytes());
        png.extend_from_slice(&height.to_be_bytes());
        png.extend_from_slice(&[8, 6, 0, 0, 0]);
        png
    }

    /// Write a small PNG named `name` into `dir`.
    pub fn write_image(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, png_bytes(32, 32)).expect("write test image");
        path
    }

    /// Manifest entry served from a mock host.
    pub fn manifest_entry(title: &str) -> ManifestEntry {
        ManifestEntry::new(title, artifact_url(title))
    }

    pub fn artifact_url(title: &str) -> String {
        format!("https://mock.invalid/checkpoints/{}", title)
    }

    /// Checkpoints config rooted at `root` with the given manifest titles.
    pub fn checkpoints_config(root: &Path, titles: &[&str]) -> CheckpointsConfig {
        CheckpointsConfig {
            root: Some(root.to_path_buf()),
            artifacts: titles.iter().map(|t| manifest_entry(t)).collect(),
            ..Default::default()
        }
    }
}
