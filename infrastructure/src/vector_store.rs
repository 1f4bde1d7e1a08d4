use domain::error::StoreError;
use domain::models::{Chunk, Embedding};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::embedding_storage::EmbeddingStorage;
use crate::search::SearchEngine;

pub const STORE_FILE: &str = "embeddings.db";
const META_EMBEDDING_MODEL: &str = "embedding_model";

fn storage_err(err: impl std::fmt::Display) -> StoreError {
    StoreError::Storage(err.to_string())
}

/// In-memory view of a persisted vector index.
///
/// The whole index is read at open time; searches never touch the disk.
#[derive(Debug)]
pub struct VectorStore {
    embedding_model: Option<String>,
    embeddings: Vec<Embedding>,
}

impl VectorStore {
    pub fn store_path(directory: &Path) -> PathBuf {
        directory.join(STORE_FILE)
    }

    /// Whether a persisted index exists under `directory`.
    pub fn exists(directory: &Path) -> bool {
        Self::store_path(directory).is_file()
    }

    /// Persist `embeddings` as the index in `directory`, replacing whatever
    /// was there. Each call writes its own uniquely named temporary file and
    /// renames it into place once complete, so concurrent builds never share
    /// a half-written file.
    pub fn create(
        directory: &Path,
        embedding_model: &str,
        embeddings: Vec<Embedding>,
    ) -> Result<Self, StoreError> {
        fs::create_dir_all(directory).map_err(storage_err)?;
        let tmp = NamedTempFile::new_in(directory).map_err(storage_err)?;

        {
            let storage = EmbeddingStorage::create(tmp.path())?;
            storage.insert_embeddings(&embeddings)?;
            storage.set_meta(META_EMBEDDING_MODEL, embedding_model)?;
        }
        tmp.persist(Self::store_path(directory))
            .map_err(|e| storage_err(e.error))?;

        info!(
            count = embeddings.len(),
            directory = %directory.display(),
            "created vector store"
        );
        Ok(Self {
            embedding_model: Some(embedding_model.to_string()),
            embeddings,
        })
    }

    pub fn open(directory: &Path) -> Result<Self, StoreError> {
        let storage = EmbeddingStorage::open(Self::store_path(directory))?;
        let embeddings = storage.get_all_embeddings()?;
        let embedding_model = storage.get_meta(META_EMBEDDING_MODEL)?;
        Ok(Self {
            embedding_model,
            embeddings,
        })
    }

    pub fn embedding_model(&self) -> Option<&str> {
        self.embedding_model.as_deref()
    }

    pub fn chunk_count(&self) -> usize {
        self.embeddings.len()
    }

    /// The `k` chunks nearest the query vector, best first.
    pub fn similarity_search(&self, query_embedding: &[f32], k: usize) -> Vec<Chunk> {
        SearchEngine::find_relevant(query_embedding, &self.embeddings, k)
            .into_iter()
            .map(|(_, embedding)| embedding.chunk.clone())
            .collect()
    }
}
