use domain::models::Embedding;

pub struct SearchEngine;

impl SearchEngine {
    /// Cosine similarity; zero-length vectors score 0.
    pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
        let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        dot_product / (norm_a * norm_b)
    }

    /// The `top_k` rows most similar to the query, best first.
    pub fn find_relevant<'a>(
        query_embedding: &[f32],
        embeddings: &'a [Embedding],
        top_k: usize,
    ) -> Vec<(f32, &'a Embedding)> {
        let mut similarities: Vec<(f32, &Embedding)> = embeddings
            .iter()
            .map(|emb| (Self::cosine_similarity(query_embedding, &emb.vector), emb))
            .collect();

        similarities.sort_by(|a, b| b.0.total_cmp(&a.0));
        similarities.truncate(top_k);
        similarities
    }
}
