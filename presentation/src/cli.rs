use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use application::answer_service::AnswerService;
use application::embedding_service::EmbeddingService;
use application::indexing_service::IndexingService;
use clap::Parser;
use domain::models::IndexState;
use infrastructure::config::Config;
use infrastructure::document_loader::DocumentLoader;
use infrastructure::ollama_client::OllamaClient;
use infrastructure::text_splitter::TextSplitter;
use shared::types::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::http::{self, AppState};

#[derive(Parser, Debug, Default)]
#[command(name = "rag-server", version, about = "Ask questions about a folder of documents")]
pub struct Cli {
    /// Interface to bind (overrides SERVER_HOST).
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (overrides SERVER_PORT).
    #[arg(long)]
    pub port: Option<u16>,

    /// Default directory for /index and startup indexing (overrides DOCUMENTS_DIR).
    #[arg(long)]
    pub documents_dir: Option<PathBuf>,
}

impl Cli {
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.documents_dir {
            config.documents_dir = dir;
        }
        config
    }
}

pub struct ServerApp {
    config: Config,
}

impl ServerApp {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Wire the services against the configured Ollama endpoints.
    pub fn state(&self) -> Result<AppState> {
        let config = &self.config;
        let client = Arc::new(OllamaClient::new(config));
        let splitter = TextSplitter::new(config.chunk_size, config.chunk_overlap)?;
        let embeddings = Arc::new(EmbeddingService::new(
            client.clone(),
            config.vector_store_dir.clone(),
        ));
        let indexer = Arc::new(IndexingService::new(DocumentLoader::new(splitter), embeddings));
        Ok(AppState::new(
            indexer,
            AnswerService::new(client),
            config.documents_dir.clone(),
        ))
    }

    pub async fn run(self) -> Result<()> {
        let state = web::Data::new(self.state()?);

        info!("Checking if vector store exists...");
        match state.indexer.bootstrap(&self.config.documents_dir).await {
            IndexState::Indexed => info!("Vector store ready"),
            other => info!(state = ?other, "Serving without an index"),
        }

        let (host, port) = (self.config.host.clone(), self.config.port);
        info!("Starting server on http://{host}:{port}");
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(Logger::default())
                .wrap(cors)
                .app_data(state.clone())
                .configure(http::configure)
        })
        .bind((host, port))?
        .run()
        .await?;

        Ok(())
    }
}
