//! Mock recognition pipeline for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::orchestrator::{
    Extraction, PipelineError, PipelineRequest, RecognitionPipeline, RecognitionState,
    NOTATION_EXTENSION,
};

/// Mock implementation of the RecognitionPipeline trait.
///
/// Behaves like a backend with process-wide state: every extract appends the
/// input image name to a shared layer list that only `reset()` clears. The
/// state returned by `extract` is a snapshot of that list.
///
/// # Example
///
/// ```rust,ignore
/// use scorebridge_core::testing::MockRecognitionPipeline;
///
/// let pipeline = MockRecognitionPipeline::new();
/// pipeline.set_next_error(PipelineError::processing_failed("no staves", None)).await;
///
/// // Use in PredictionOrchestrator...
///
/// assert_eq!(pipeline.recorded_requests().await.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockRecognitionPipeline {
    requests: Arc<RwLock<Vec<PipelineRequest>>>,
    layers: Arc<RwLock<Vec<String>>>,
    resets: Arc<AtomicUsize>,
    next_error: Arc<RwLock<Option<PipelineError>>>,
    /// Simulated recognition time.
    delay: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockRecognitionPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded requests.
    pub async fn recorded_requests(&self) -> Vec<PipelineRequest> {
        self.requests.read().await.clone()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    /// Highest number of extract calls observed running at once.
    pub fn max_concurrent_extracts(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Current contents of the shared layer list.
    pub async fn current_layers(&self) -> Vec<String> {
        self.layers.read().await.clone()
    }

    /// Configure the next extract to fail with the given error.
    pub async fn set_next_error(&self, error: PipelineError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = delay;
    }

    async fn run(&self, request: &PipelineRequest) -> Result<Extraction, PipelineError> {
        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        let image_name = request
            .img_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.layers.write().await.push(image_name);

        let delay = *self.delay.read().await;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let notation_path = request
            .output_path
            .join(format!("{}{}", request.stem(), NOTATION_EXTENSION));
        let document = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<score-partwise source=\"{}\"/>\n",
            request.img_path.display()
        );
        tokio::fs::write(&notation_path, document).await?;

        let layers = self.layers.read().await.clone();
        Ok(Extraction {
            notation_path,
            state: RecognitionState::new(&request.img_path).with_layers(layers),
        })
    }
}

#[async_trait]
impl RecognitionPipeline for MockRecognitionPipeline {
    fn name(&self) -> &str {
        "mock"
    }

    async fn reset(&self) -> Result<(), PipelineError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.layers.write().await.clear();
        Ok(())
    }

    async fn extract(&self, request: &PipelineRequest) -> Result<Extraction, PipelineError> {
        self.requests.write().await.push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.run(request).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }

    async fn validate(&self) -> Result<(), PipelineError> {
        Ok(())
    }
}
