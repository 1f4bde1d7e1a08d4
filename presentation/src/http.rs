//! HTTP surface: indexing, buffered and streamed question answering, health.

use actix_web::error::{InternalError, JsonPayloadError};
use actix_web::web::{self, Bytes};
use actix_web::{HttpRequest, HttpResponse};
use application::answer_service::{sources, AnswerService};
use application::embedding_service::{EmbeddingService, DEFAULT_TOP_K};
use application::indexing_service::IndexingService;
use domain::error::{GenerationError, RagError};
use domain::models::{Chunk, Source, StreamEvent};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Service handles shared by every worker.
pub struct AppState {
    pub embeddings: Arc<EmbeddingService>,
    pub answers: AnswerService,
    pub indexer: Arc<IndexingService>,
    pub documents_dir: PathBuf,
}

impl AppState {
    pub fn new(
        indexer: Arc<IndexingService>,
        answers: AnswerService,
        documents_dir: PathBuf,
    ) -> Self {
        Self {
            embeddings: Arc::clone(indexer.embeddings()),
            answers,
            indexer,
            documents_dir,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct IndexRequest {
    pub documents_directory: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexResponse {
    pub status: String,
    pub message: String,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub max_context_docs: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .route("/health", web::get().to(health))
        .route("/index", web::post().to(index_documents))
        .route("/query", web::post().to(query))
        .route("/query-stream", web::post().to(query_stream));
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::UnprocessableEntity().json(ErrorResponse {
        detail: err.to_string(),
    });
    InternalError::from_response(err, response).into()
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "healthy" }))
}

async fn index_documents(
    state: web::Data<AppState>,
    request: web::Json<IndexRequest>,
) -> HttpResponse {
    let directory = request
        .into_inner()
        .documents_directory
        .map(PathBuf::from)
        .unwrap_or_else(|| state.documents_dir.clone());

    info!("Scheduling indexing of {}", directory.display());
    let message = format!(
        "Indexing documents from {} in the background.",
        directory.display()
    );
    state.indexer.spawn(directory);

    HttpResponse::Accepted().json(IndexResponse {
        status: "processing".to_string(),
        message,
    })
}

async fn query(state: web::Data<AppState>, request: web::Json<QueryRequest>) -> HttpResponse {
    let request = request.into_inner();
    let context = match retrieve(&state, &request).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    let answer = match state.answers.generate(&request.query, &context).await {
        Ok(answer) => answer,
        Err(err) => format!("I encountered an error while processing your question: {err}"),
    };

    HttpResponse::Ok().json(QueryResponse {
        answer,
        sources: sources(&context),
    })
}

async fn query_stream(
    state: web::Data<AppState>,
    request: web::Json<QueryRequest>,
) -> HttpResponse {
    let request = request.into_inner();
    let context = match retrieve(&state, &request).await {
        Ok(context) => context,
        Err(response) => return response,
    };

    let fragments = state.answers.generate_stream(&request.query, &context);
    HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header(("Cache-Control", "no-cache"))
        .streaming(event_stream(fragments))
}

async fn retrieve(state: &AppState, request: &QueryRequest) -> Result<Vec<Chunk>, HttpResponse> {
    state
        .embeddings
        .search(&request.query, request.max_context_docs)
        .await
        .map_err(query_failed)
}

fn query_failed(err: RagError) -> HttpResponse {
    error!("Error processing query: {err}");
    let detail = if err.is_not_initialized() {
        err.to_string()
    } else {
        format!("Error processing query: {err}")
    };
    HttpResponse::InternalServerError().json(ErrorResponse { detail })
}

/// One `content` event per fragment, then `done`; a failure ends the stream
/// with a single `error` event instead.
pub fn event_stream(
    fragments: BoxStream<'static, Result<String, GenerationError>>,
) -> impl Stream<Item = Result<Bytes, Infallible>> {
    stream::unfold(Some(fragments), |state| async move {
        let mut fragments = state?;
        let (event, rest) = match fragments.next().await {
            Some(Ok(text)) => (StreamEvent::Content(text), Some(fragments)),
            Some(Err(err)) => {
                let message = format!("Error during streaming: {err}");
                error!("{message}");
                (StreamEvent::Error(message), None)
            }
            None => (StreamEvent::Done, None),
        };
        Some((Ok::<_, Infallible>(encode_event(&event)), rest))
    })
}

pub fn encode_event(event: &StreamEvent) -> Bytes {
    let json = serde_json::to_string(event)
        .unwrap_or_else(|_| r#"{"type":"error","data":"unserialisable event"}"#.to_string());
    Bytes::from(format!("data: {json}\n\n"))
}
