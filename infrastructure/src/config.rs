use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use shared::types::Result;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DOCUMENTS_DIR: &str = "./data/documents";
pub const DEFAULT_VECTOR_STORE_DIR: &str = "./data/vector_store";

#[derive(Debug, Clone)]
pub struct Config {
    pub ollama_base_url: String,
    pub ollama_api_key: Option<String>,
    pub ollama_model: String,
    pub embedding_base_url: String,
    pub embedding_model: String,
    pub documents_dir: PathBuf,
    pub vector_store_dir: PathBuf,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub host: String,
    pub port: u16,
    pub generation_timeout: Duration,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Config {
    /// Read configuration from the environment, after loading `.env` if present.
    pub fn load() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ollama_base_url = get("OLLAMA_BASE_URL")
            .unwrap_or_else(|| "http://localhost:11434".to_string())
            .trim_end_matches('/')
            .to_string();
        let embedding_base_url = get("EMBEDDING_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| ollama_base_url.clone());

        let config = Self {
            ollama_api_key: get("OLLAMA_API_KEY"),
            ollama_model: get("OLLAMA_MODEL").unwrap_or_else(|| "phi4".to_string()),
            embedding_model: get("EMBEDDING_MODEL").unwrap_or_else(|| "all-minilm".to_string()),
            documents_dir: get("DOCUMENTS_DIR")
                .unwrap_or_else(|| DEFAULT_DOCUMENTS_DIR.to_string())
                .into(),
            vector_store_dir: get("VECTOR_STORE_DIR")
                .unwrap_or_else(|| DEFAULT_VECTOR_STORE_DIR.to_string())
                .into(),
            chunk_size: parse_or(get("CHUNK_SIZE"), "CHUNK_SIZE", 1000)?,
            chunk_overlap: parse_or(get("CHUNK_OVERLAP"), "CHUNK_OVERLAP", 200)?,
            host: get("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("SERVER_PORT"), "SERVER_PORT", 8000)?,
            generation_timeout: Duration::from_secs(60),
            temperature: 0.1,
            max_tokens: 1024,
            ollama_base_url,
            embedding_base_url,
        };

        if config.chunk_size == 0 {
            return Err(anyhow!("CHUNK_SIZE must be greater than zero"));
        }
        if config.chunk_overlap > config.chunk_size {
            return Err(anyhow!(
                "CHUNK_OVERLAP ({}) is larger than CHUNK_SIZE ({})",
                config.chunk_overlap,
                config.chunk_size
            ));
        }
        Ok(config)
    }
}

fn parse_or<T>(raw: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {value:?}")),
        None => Ok(default),
    }
}
