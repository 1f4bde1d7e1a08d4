use domain::error::EmbedError;
use domain::models::{Chunk, Embedding};
use domain::providers::EmbeddingProvider;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::debug;

const BATCH_SIZE: usize = 32;
const MAX_IN_FLIGHT: usize = 8;

/// Batches chunk embedding requests against an [`EmbeddingProvider`].
#[derive(Clone)]
pub struct Embedder {
    provider: Arc<dyn EmbeddingProvider>,
}

impl Embedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self { provider }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.provider.embed(text).await
    }

    /// Embed every chunk. Output order follows input order.
    pub async fn generate_embeddings(
        &self,
        chunks: &[Chunk],
    ) -> Result<Vec<Embedding>, EmbedError> {
        let mut embeddings = Vec::with_capacity(chunks.len());

        for (batch_index, batch) in chunks.chunks(BATCH_SIZE).enumerate() {
            debug!(batch = batch_index, size = batch.len(), "generating embeddings");
            let offset = batch_index * BATCH_SIZE;
            let batch_embeddings = self.generate_batch_embeddings(offset, batch).await?;
            embeddings.extend(batch_embeddings);
        }
        Ok(embeddings)
    }

    async fn generate_batch_embeddings(
        &self,
        offset: usize,
        batch: &[Chunk],
    ) -> Result<Vec<Embedding>, EmbedError> {
        let futures: Vec<_> = batch
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let provider = &self.provider;
                let position = offset + i;
                async move {
                    let vector = provider.embed(&chunk.text).await?;
                    Ok(Embedding {
                        id: chunk_id(position, chunk),
                        vector,
                        chunk: chunk.clone(),
                    }) as Result<Embedding, EmbedError>
                }
            })
            .collect();

        let results = stream::iter(futures)
            .buffered(MAX_IN_FLIGHT)
            .collect::<Vec<_>>()
            .await;

        results.into_iter().collect()
    }
}

/// Stable identity of a chunk within one index build.
pub fn chunk_id(position: usize, chunk: &Chunk) -> String {
    let key = format!("{}:{}:{}", position, chunk.metadata.source, chunk.text);
    format!("{:x}", md5::compute(key.as_bytes()))
}
