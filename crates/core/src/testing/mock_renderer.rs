//! Mock teaser renderer for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::orchestrator::{Extraction, PipelineError, TeaserImage, TeaserRenderer};

use super::fixtures;

/// Mock implementation of the TeaserRenderer trait.
///
/// Encodes a minimal PNG whose width is the number of recognition layers
/// and appends the layer names after the header, so tests can read back
/// exactly which state a teaser was drawn from.
#[derive(Debug, Clone, Default)]
pub struct MockTeaserRenderer {
    rendered: Arc<RwLock<Vec<Vec<String>>>>,
    next_error: Arc<RwLock<Option<PipelineError>>>,
}

impl MockTeaserRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer lists of every teaser rendered so far.
    pub async fn rendered_layers(&self) -> Vec<Vec<String>> {
        self.rendered.read().await.clone()
    }

    /// Configure the next render to fail with the given error.
    pub async fn set_next_error(&self, error: PipelineError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl TeaserRenderer for MockTeaserRenderer {
    fn name(&self) -> &str {
        "mock"
    }

    async fn render(&self, extraction: &Extraction) -> Result<TeaserImage, PipelineError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let layers = extraction.state.layers.clone();
        let mut png = fixtures::png_bytes(layers.len().max(1) as u32, 1);
        png.extend_from_slice(layers.join("\n").as_bytes());
        self.rendered.write().await.push(layers);

        TeaserImage::from_png(png).ok_or_else(|| PipelineError::render("mock produced invalid PNG"))
    }
}
