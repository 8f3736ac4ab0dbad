//! reqwest-backed artifact source.

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::config::CheckpointsConfig;

use super::error::ProvisionError;
use super::traits::{ArtifactSource, ArtifactStream};

/// Streams artifacts over HTTP(S).
pub struct HttpArtifactSource {
    client: Client,
}

impl HttpArtifactSource {
    /// Creates a source with the given user agent and whole-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| ProvisionError::Client(e.to_string()))?;

        Ok(Self { client })
    }

    pub fn from_config(config: &CheckpointsConfig) -> Result<Self, ProvisionError> {
        Self::new(&config.user_agent, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl ArtifactSource for HttpArtifactSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn open(&self, url: &str) -> Result<Box<dyn ArtifactStream>, ProvisionError> {
        debug!("Opening {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProvisionError::network(url, e))?;

        if !response.status().is_success() {
            return Err(ProvisionError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let content_length = response.content_length();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(Box::new(HttpArtifactStream {
            url: url.to_string(),
            content_length,
            body,
        }))
    }
}

struct HttpArtifactStream {
    url: String,
    content_length: Option<u64>,
    body: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
}

#[async_trait]
impl ArtifactStream for HttpArtifactStream {
    fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ProvisionError> {
        match self.body.next().await {
            Some(Ok(chunk)) => Ok(Some(chunk)),
            Some(Err(e)) => Err(ProvisionError::network(&self.url, e)),
            None => Ok(None),
        }
    }
}
