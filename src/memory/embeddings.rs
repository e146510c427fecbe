// src/memory/embeddings.rs — Vector and keyword similarity

use std::collections::HashSet;

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}

/// Count the distinct whitespace-delimited tokens shared between a query
/// and a candidate text, case-insensitive. The keyword fallback ranks
/// lessons by this count.
pub fn shared_token_count(query: &str, text: &str) -> usize {
    let query_tokens: HashSet<String> =
        query.split_whitespace().map(|w| w.to_lowercase()).collect();
    let text_tokens: HashSet<String> =
        text.split_whitespace().map(|w| w.to_lowercase()).collect();

    query_tokens.intersection(&text_tokens).count()
}
