use async_stream::try_stream;
use async_trait::async_trait;
use domain::error::{EmbedError, GenerationError};
use domain::providers::{EmbeddingProvider, TextGenerator};
use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Config;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Serialize, Clone, Copy)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// One NDJSON line of a streamed `/api/generate` response.
#[derive(Deserialize)]
struct StreamLine {
    response: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct OllamaClient {
    client: Arc<Client>,
    base_url: String,
    embedding_base_url: String,
    model: String,
    embedding_model: String,
    api_key: Option<String>,
    timeout: Duration,
    options: GenerateOptions,
}

impl OllamaClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Arc::new(Client::new()),
            base_url: config.ollama_base_url.clone(),
            embedding_base_url: config.embedding_base_url.clone(),
            model: config.ollama_model.clone(),
            embedding_model: config.embedding_model.clone(),
            api_key: config.ollama_api_key.clone(),
            timeout: config.generation_timeout,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
        }
    }

    fn post(&self, url: &str) -> RequestBuilder {
        let request = self.client.post(url);
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    fn generate_request(&self, prompt: &str, stream: bool) -> RequestBuilder {
        let url = format!("{}/api/generate", self.base_url);
        self.post(&url).json(&GenerateRequest {
            model: &self.model,
            prompt,
            stream,
            options: self.options,
        })
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let url = format!("{}/api/embeddings", self.embedding_base_url);
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };
        let response = self
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbedError::Request(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::Decode(e.to_string()))?;
        if embedding_response.embedding.is_empty() {
            return Err(EmbedError::Decode("empty embedding vector".to_string()));
        }
        Ok(embedding_response.embedding)
    }

    pub async fn generate_response(&self, prompt: &str) -> Result<String, GenerationError> {
        let result = async {
            let response = self
                .generate_request(prompt, false)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;
            Ok::<_, GenerationError>(parsed.response)
        }
        .await;

        if let Err(err) = &result {
            error!(model = %self.model, "{err}");
        }
        result
    }

    pub fn generate_response_stream(
        &self,
        prompt: &str,
    ) -> BoxStream<'static, Result<String, GenerationError>> {
        let request = self.generate_request(prompt, true);
        let model = self.model.clone();
        let fragments = async move {
            debug!(%model, "opening generation stream");
            let response = request
                .send()
                .await
                .map_err(|e| GenerationError::Transport(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(GenerationError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            let bytes = response
                .bytes_stream()
                .map_err(|e| GenerationError::Transport(e.to_string()));
            Ok::<_, GenerationError>(decode_stream_lines(Box::pin(bytes)))
        };
        stream::once(fragments).try_flatten().boxed()
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaClient {
    fn model_name(&self) -> &str {
        &self.embedding_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.generate_embedding(text).await
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_response(prompt).await
    }

    fn generate_stream(&self, prompt: &str) -> BoxStream<'static, Result<String, GenerationError>> {
        self.generate_response_stream(prompt)
    }
}

/// Interpret one line of the generation stream. Blank lines and empty
/// fragments yield nothing; lines that are not JSON are forwarded verbatim.
fn parse_stream_line(line: &[u8]) -> Result<Option<String>, GenerationError> {
    let text = String::from_utf8_lossy(line);
    let raw = text.trim_end_matches(&['\r', '\n'][..]);
    if raw.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<StreamLine>(raw) {
        Ok(StreamLine {
            error: Some(message),
            ..
        }) => Err(GenerationError::Upstream(message)),
        Ok(StreamLine { response, .. }) => Ok(response.filter(|f| !f.is_empty())),
        Err(_) => Ok(Some(raw.to_string())),
    }
}

/// Split a byte stream into newline-delimited lines and turn each into a text
/// fragment. The stream ends after the first error.
pub fn decode_stream_lines<S, B>(
    mut bytes: S,
) -> impl Stream<Item = Result<String, GenerationError>>
where
    S: Stream<Item = Result<B, GenerationError>> + Unpin,
    B: AsRef<[u8]>,
{
    try_stream! {
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = bytes.next().await {
            buffer.extend_from_slice(chunk?.as_ref());
            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(fragment) = parse_stream_line(&line)? {
                    yield fragment;
                }
            }
        }
        if let Some(fragment) = parse_stream_line(&buffer)? {
            yield fragment;
        }
    }
}
