use domain::error::{RagError, StoreError};
use domain::models::Chunk;
use domain::providers::EmbeddingProvider;
use infrastructure::embedder::Embedder;
use infrastructure::vector_store::VectorStore;
use shared::telemetry::Telemetry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

pub const DEFAULT_TOP_K: usize = 4;

/// Owns the vector index: builds it from chunks, persists it, reloads it and
/// answers similarity queries.
///
/// The attached store is swapped wholesale by `build` and `load`; readers
/// clone the `Arc` and search without holding the lock, so the last writer
/// wins and in-flight searches finish against whichever store they picked up.
/// Builds persist and attach one at a time, so the attached store always
/// matches the file on disk.
pub struct EmbeddingService {
    embedder: Embedder,
    persist_directory: PathBuf,
    store: RwLock<Option<Arc<VectorStore>>>,
    build_lock: Mutex<()>,
}

impl EmbeddingService {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        persist_directory: impl Into<PathBuf>,
    ) -> Self {
        Self {
            embedder: Embedder::new(provider),
            persist_directory: persist_directory.into(),
            store: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub async fn is_loaded(&self) -> bool {
        self.store.read().await.is_some()
    }

    async fn current_store(&self) -> Option<Arc<VectorStore>> {
        self.store.read().await.clone()
    }

    /// Embed `chunks` and persist them as the new index. Empty input leaves
    /// everything untouched.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<(), RagError> {
        if chunks.is_empty() {
            info!("No documents provided to create vector store.");
            return Ok(());
        }

        let telemetry = Telemetry::new();
        let embeddings = self.embedder.generate_embeddings(&chunks).await?;
        let directory = self.persist_directory.clone();
        let model = self.embedder.model_name().to_string();
        let _build = self.build_lock.lock().await;
        let store = tokio::task::spawn_blocking(move || {
            VectorStore::create(&directory, &model, embeddings)
        })
        .await
        .map_err(|e| RagError::Task(e.to_string()))??;

        *self.store.write().await = Some(Arc::new(store));
        info!(
            chunks = chunks.len(),
            elapsed_ms = telemetry.elapsed_ms() as u64,
            "Created vector store with {} documents at {}",
            chunks.len(),
            self.persist_directory.display()
        );
        Ok(())
    }

    /// Attach the persisted index. `Ok(false)` when none exists on disk.
    pub async fn load(&self) -> Result<bool, RagError> {
        if !VectorStore::exists(&self.persist_directory) {
            info!(
                "Vector store not found at {}",
                self.persist_directory.display()
            );
            return Ok(false);
        }

        let directory = self.persist_directory.clone();
        let _build = self.build_lock.lock().await;
        let store = tokio::task::spawn_blocking(move || VectorStore::open(&directory))
            .await
            .map_err(|e| RagError::Task(e.to_string()))??;

        if let Some(model) = store.embedding_model() {
            if model != self.embedder.model_name() {
                warn!(
                    stored = model,
                    configured = self.embedder.model_name(),
                    "vector store was built with a different embedding model; results may be poor"
                );
            }
        }

        let count = store.chunk_count();
        *self.store.write().await = Some(Arc::new(store));
        info!(
            chunks = count,
            "Loaded vector store from {}",
            self.persist_directory.display()
        );
        Ok(true)
    }

    /// The `k` chunks most similar to `query`. Loads the persisted index on
    /// first use; fails with `NotInitialized` when there is none.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<Chunk>, RagError> {
        let store = match self.current_store().await {
            Some(store) => store,
            None => {
                if !self.load().await? {
                    return Err(StoreError::NotInitialized.into());
                }
                self.current_store()
                    .await
                    .ok_or(StoreError::NotInitialized)?
            }
        };

        let query_embedding = self.embedder.embed_query(query).await?;
        Ok(store.similarity_search(&query_embedding, k))
    }
}
