pub mod config;
pub mod document_loader;
pub mod embedder;
pub mod embedding_storage;
pub mod extractors;
pub mod ollama_client;
pub mod search;
pub mod text_splitter;
pub mod vector_store;
