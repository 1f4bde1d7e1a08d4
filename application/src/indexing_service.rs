use domain::error::RagError;
use domain::models::IndexState;
use infrastructure::document_loader::DocumentLoader;
use shared::telemetry::Telemetry;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::embedding_service::EmbeddingService;

/// Runs the load → split → embed → persist pipeline and tracks whether an
/// index is available.
pub struct IndexingService {
    loader: DocumentLoader,
    embeddings: Arc<EmbeddingService>,
    in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl IndexingService {
    pub fn new(loader: DocumentLoader, embeddings: Arc<EmbeddingService>) -> Self {
        Self {
            loader,
            embeddings,
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingService> {
        &self.embeddings
    }

    pub async fn state(&self) -> IndexState {
        if self.in_flight.load(Ordering::SeqCst) > 0 {
            IndexState::Indexing
        } else if self.embeddings.is_loaded().await {
            IndexState::Indexed
        } else {
            IndexState::Unindexed
        }
    }

    /// Index every supported file under `directory`. Returns the number of
    /// chunks written; zero leaves any existing index in place.
    pub async fn run(&self, directory: &Path) -> Result<usize, RagError> {
        let _guard = InFlight::enter(&self.in_flight);
        let telemetry = Telemetry::new();
        info!("Indexing documents from {}", directory.display());

        let loader = self.loader.clone();
        let dir = directory.to_path_buf();
        let chunks = tokio::task::spawn_blocking(move || loader.process_documents(&dir))
            .await
            .map_err(|e| RagError::Task(e.to_string()))?;

        let count = chunks.len();
        self.embeddings.build(chunks).await?;
        info!(
            elapsed_ms = telemetry.elapsed_ms() as u64,
            "Successfully indexed {count} document chunks"
        );
        Ok(count)
    }

    /// Fire-and-forget indexing. Failures are logged and otherwise dropped.
    pub fn spawn(self: &Arc<Self>, directory: PathBuf) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = service.run(&directory).await {
                error!("Error in background indexing task: {err}");
            }
        })
    }

    /// Startup sequence: attach a persisted index if there is one, otherwise
    /// index `documents_dir` in the foreground when it has any entries.
    pub async fn bootstrap(&self, documents_dir: &Path) -> IndexState {
        match self.embeddings.load().await {
            Ok(true) => return self.state().await,
            Ok(false) => {}
            Err(err) => warn!("Could not load existing vector store: {err}"),
        }

        if let Err(err) = tokio::fs::create_dir_all(documents_dir).await {
            warn!(
                "Could not create documents directory {}: {err}",
                documents_dir.display()
            );
            return self.state().await;
        }

        if has_entries(documents_dir).await {
            info!("Documents found in {}, indexing before startup", documents_dir.display());
            if let Err(err) = self.run(documents_dir).await {
                error!("Initial indexing failed: {err}");
            }
        } else {
            info!(
                "No documents found in {}. Add documents and use the /index endpoint.",
                documents_dir.display()
            );
        }
        self.state().await
    }
}

async fn has_entries(directory: &Path) -> bool {
    match tokio::fs::read_dir(directory).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(Some(_))),
        Err(_) => false,
    }
}
