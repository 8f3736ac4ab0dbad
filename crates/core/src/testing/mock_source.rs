//! Mock artifact source for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::provisioner::{ArtifactSource, ArtifactStream, ProvisionError};

/// Mock implementation of the ArtifactSource trait.
///
/// Serves in-memory bodies by URL. Unknown URLs answer 404. Clones share
/// state, so a test can keep a handle after moving one into a provisioner.
///
/// # Example
///
/// ```rust,ignore
/// use scorebridge_core::testing::MockArtifactSource;
///
/// let source = MockArtifactSource::new();
/// source.set_body("https://host/1st_model.onnx", vec![0u8; 64]).await;
///
/// let provisioner = ArtifactProvisioner::new(&config, source.clone())?;
/// provisioner.ensure_artifacts().await?;
///
/// assert_eq!(source.opened_urls().await, vec!["https://host/1st_model.onnx"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockArtifactSource {
    bodies: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    /// Overrides the declared length; absent means the real body length.
    declared: Arc<RwLock<HashMap<String, Option<u64>>>>,
    statuses: Arc<RwLock<HashMap<String, u16>>>,
    /// Body bytes served before the stream breaks.
    fail_after: Arc<RwLock<HashMap<String, usize>>>,
    opened: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<ProvisionError>>>,
    /// Size of the chunks the stream yields; 0 yields the whole body at once.
    stream_chunk_size: Arc<RwLock<usize>>,
}

impl MockArtifactSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub async fn set_body(&self, url: &str, body: Vec<u8>) {
        self.bodies.write().await.insert(url.to_string(), body);
    }

    /// Declare a content length other than the body length, or none at all.
    pub async fn set_declared_length(&self, url: &str, length: Option<u64>) {
        self.declared.write().await.insert(url.to_string(), length);
    }

    /// Answer `url` with a non-success status.
    pub async fn set_status(&self, url: &str, status: u16) {
        self.statuses.write().await.insert(url.to_string(), status);
    }

    /// Serve `url` normally again after [`set_status`](Self::set_status).
    pub async fn clear_status(&self, url: &str) {
        self.statuses.write().await.remove(url);
    }

    /// Break the body of `url` after `bytes` bytes.
    pub async fn set_fail_after(&self, url: &str, bytes: usize) {
        self.fail_after.write().await.insert(url.to_string(), bytes);
    }

    /// Configure the next open to fail with the given error.
    pub async fn set_next_error(&self, error: ProvisionError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn set_stream_chunk_size(&self, size: usize) {
        *self.stream_chunk_size.write().await = size;
    }

    /// URLs opened so far, in order.
    pub async fn opened_urls(&self) -> Vec<String> {
        self.opened.read().await.clone()
    }

    pub async fn open_count(&self) -> usize {
        self.opened.read().await.len()
    }
}

#[async_trait]
impl ArtifactSource for MockArtifactSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, url: &str) -> Result<Box<dyn ArtifactStream>, ProvisionError> {
        self.opened.write().await.push(url.to_string());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }
        if let Some(status) = self.statuses.read().await.get(url) {
            return Err(ProvisionError::HttpStatus {
                url: url.to_string(),
                status: *status,
            });
        }

        let body = self
            .bodies
            .read()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| ProvisionError::HttpStatus {
                url: url.to_string(),
                status: 404,
            })?;

        let declared = match self.declared.read().await.get(url) {
            Some(length) => *length,
            None => Some(body.len() as u64),
        };

        Ok(Box::new(MockArtifactStream {
            url: url.to_string(),
            body,
            position: 0,
            declared,
            chunk_size: *self.stream_chunk_size.read().await,
            fail_after: self.fail_after.read().await.get(url).copied(),
        }))
    }
}

struct MockArtifactStream {
    url: String,
    body: Vec<u8>,
    position: usize,
    declared: Option<u64>,
    chunk_size: usize,
    fail_after: Option<usize>,
}

#[async_trait]
impl ArtifactStream for MockArtifactStream {
    fn content_length(&self) -> Option<u64> {
        self.declared
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ProvisionError> {
        let limit = self.fail_after.unwrap_or(self.body.len()).min(self.body.len());
        if self.position >= limit {
            if self.fail_after.is_some() {
                return Err(ProvisionError::network(&self.url, "connection reset"));
            }
            return Ok(None);
        }

        let end = if self.chunk_size == 0 {
            limit
        } else {
            (self.position + self.chunk_size).min(limit)
        };
        let chunk = self.body[self.position..end].to_vec();
        self.position = end;
        Ok(Some(chunk))
    }
}
