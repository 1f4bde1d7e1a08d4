//! Seams to the external capabilities the service coordinates.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::{EmbedError, GenerationError};

/// Turns text into a fixed-dimension vector.
///
/// The same provider (and model) must be used to build an index and to query
/// it; nothing checks this beyond a logged warning.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Text-generation endpoint.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Single blocking completion.
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;

    /// Incremental completion. The request is issued when the stream is
    /// first polled; dropping the stream releases the upstream connection.
    fn generate_stream(&self, prompt: &str) -> BoxStream<'static, Result<String, GenerationError>>;
}
