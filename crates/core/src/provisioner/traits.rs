//! Trait definitions for artifact sources.

use async_trait::async_trait;

use super::error::ProvisionError;

/// A remote location artifacts can be streamed from.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Returns the name of this source implementation.
    fn name(&self) -> &str;

    /// Opens a streaming read of `url`.
    ///
    /// Non-success responses must be reported as errors here, before any
    /// body bytes are handed out.
    async fn open(&self, url: &str) -> Result<Box<dyn ArtifactStream>, ProvisionError>;
}

/// An open artifact body.
#[async_trait]
pub trait ArtifactStream: Send {
    /// Declared content length, if known.
    fn content_length(&self) -> Option<u64>;

    /// Next chunk of the body, or `None` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, ProvisionError>;
}
