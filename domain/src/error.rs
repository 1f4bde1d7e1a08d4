use std::path::PathBuf;
use thiserror::Error;

/// Per-file loading failures. The loader logs these and keeps going.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type: {extension} for file {}", path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("error loading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error loading {}: {message}", path.display())]
    Extract { path: PathBuf, message: String },
}

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embedding response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Vector store not initialized. Run indexing first.")]
    NotInitialized,

    #[error("vector store error: {0}")]
    Storage(String),
}

/// Failure of the text-generation endpoint.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Error from LLM API: {status}, {body}")]
    Status { status: u16, body: String },

    #[error("Exception when calling LLM API: {0}")]
    Transport(String),

    #[error("LLM API reported an error: {0}")]
    Upstream(String),
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Embedding(#[from] EmbedError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("background task failed: {0}")]
    Task(String),
}

impl RagError {
    pub fn is_not_initialized(&self) -> bool {
        matches!(self, RagError::Store(StoreError::NotInitialized))
    }
}
