use domain::error::LoadError;
use domain::models::Chunk;
use rayon::prelude::*;
use shared::utils::{file_extension, is_hidden};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::extractors::DocumentExtractor;
use crate::text_splitter::TextSplitter;

/// Discovers files under a directory, extracts their text and splits it into
/// chunks. Failures are per file: they are logged and the file contributes
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct DocumentLoader {
    splitter: TextSplitter,
}

impl DocumentLoader {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    /// Load and chunk every supported file under `directory`.
    pub fn process_documents(&self, directory: &Path) -> Vec<Chunk> {
        let mut documents = self.load_documents(directory);
        for doc in &mut documents {
            doc.metadata.ensure_source();
        }
        let chunks = self.splitter.split_documents(&documents);
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "processed {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );
        chunks
    }

    /// Extract the text units of every supported file, without splitting.
    pub fn load_documents(&self, directory: &Path) -> Vec<Chunk> {
        let files = collect_files(directory);
        files
            .par_iter()
            .flat_map_iter(|path| match load_document(path) {
                Ok(units) => units,
                Err(LoadError::UnsupportedFormat { path, extension }) => {
                    debug!(path = %path.display(), %extension, "skipping unsupported file");
                    Vec::new()
                }
                Err(err) => {
                    warn!("{err}");
                    Vec::new()
                }
            })
            .collect()
    }
}

/// Dispatch one file to the extractor registered for its extension.
pub fn load_document(path: &Path) -> Result<Vec<Chunk>, LoadError> {
    let extension = file_extension(path).unwrap_or_default();
    let extractor =
        DocumentExtractor::for_extension(&extension).ok_or_else(|| LoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.clone(),
        })?;
    extractor.extract(path)
}

/// Regular, non-hidden files under `directory`, sorted by path.
pub fn collect_files(directory: &Path) -> Vec<PathBuf> {
    if !directory.is_dir() {
        warn!(directory = %directory.display(), "documents directory does not exist");
        return Vec::new();
    }
    WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.path()))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                warn!("skipping unreadable entry: {err}");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .collect()
}
