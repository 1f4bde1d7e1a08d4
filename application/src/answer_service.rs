use domain::error::GenerationError;
use domain::models::{Chunk, Source};
use domain::providers::TextGenerator;
use futures::stream::BoxStream;
use shared::utils::display_name;
use std::sync::Arc;

pub const REFUSAL_PHRASE: &str = "I don't have enough information to answer this question.";

/// Chunk texts separated by blank lines.
pub fn build_context(context: &[Chunk]) -> String {
    context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn build_prompt(query: &str, context: &[Chunk]) -> String {
    format!(
        "You are an AI assistant that helps users understand the documents they have provided.
Use only the information provided in the context to answer the question.
If the information needed to answer the question is not in the context, say
\"{REFUSAL_PHRASE}\"

Context:
{context}

Question: {query}

Answer:",
        context = build_context(context),
    )
}

/// Title/source pairs for the chunks an answer was grounded on.
pub fn sources(context: &[Chunk]) -> Vec<Source> {
    context
        .iter()
        .map(|chunk| Source {
            title: display_name(&chunk.metadata.source),
            source: chunk.metadata.source.clone(),
        })
        .collect()
}

/// Grounds a question in retrieved chunks and asks the generator to answer it.
#[derive(Clone)]
pub struct AnswerService {
    generator: Arc<dyn TextGenerator>,
}

impl AnswerService {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub async fn generate(
        &self,
        query: &str,
        context: &[Chunk],
    ) -> Result<String, GenerationError> {
        let prompt = build_prompt(query, context);
        self.generator.generate(&prompt).await
    }

    pub fn generate_stream(
        &self,
        query: &str,
        context: &[Chunk],
    ) -> BoxStream<'static, Result<String, GenerationError>> {
        let prompt = build_prompt(query, context);
        self.generator.generate_stream(&prompt)
    }
}
