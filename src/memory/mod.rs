// src/memory/mod.rs — Lesson memory: persistence + retrieval

pub mod embeddings;
pub mod schema;
pub mod store;

use std::sync::{Arc, Mutex};

use crate::infra::errors::ForgeError;
use crate::provider::router::ModelRouter;
use store::{Lesson, LessonStore};

/// Returned when the store is empty or no lesson matches the query.
pub const NO_LESSONS_FOUND: &str = "No prior lessons found.";

/// Retrieval-augmented lesson memory. Wraps the single-writer store in a
/// mutex and adds optional embedding-based ranking through the router's
/// embedder role. All embedding work is best-effort: failures fall back to
/// keyword retrieval and never surface to the pipeline.
pub struct LessonMemory {
    store: Mutex<LessonStore>,
    router: Option<Arc<ModelRouter>>,
}

impl LessonMemory {
    pub fn new(store: LessonStore) -> Self {
        Self {
            store: Mutex::new(store),
            router: None,
        }
    }

    /// Enable embedding computation for stored lessons and queries.
    pub fn with_router(mut self, router: Arc<ModelRouter>) -> Self {
        self.router = Some(router);
        self
    }

    /// Store a lesson, computing its embedding when an embedder is
    /// configured. Returns the new lesson id.
    pub async fn store_lesson(
        &self,
        topic: &str,
        context: &str,
        outcome: &str,
        solution: &str,
    ) -> Result<String, ForgeError> {
        let embedding = self.embed(&format!("{} {}", topic, context)).await;

        let store = self.store.lock().map_err(poisoned)?;
        store.insert(topic, context, outcome, solution, embedding.as_deref())
    }

    /// Retrieve the top-k lessons relevant to a query, formatted for prompt
    /// injection. Ranks by cosine similarity when embeddings are available
    /// on both sides, otherwise by shared keyword count.
    pub async fn retrieve_context(&self, query: &str, top_k: usize) -> String {
        let lessons = {
            let store = match self.store.lock() {
                Ok(store) => store,
                Err(e) => {
                    tracing::error!(error = %e, "lesson store lock poisoned");
                    return NO_LESSONS_FOUND.to_string();
                }
            };
            match store.all() {
                Ok(lessons) => lessons,
                Err(e) => {
                    tracing::error!(error = %e, "failed to load lessons");
                    return NO_LESSONS_FOUND.to_string();
                }
            }
        };

        if lessons.is_empty() {
            return NO_LESSONS_FOUND.to_string();
        }

        let has_vectors = lessons.iter().any(|l| l.embedding.is_some());
        if has_vectors {
            if let Some(query_embedding) = self.embed(query).await {
                return rank_by_similarity(&lessons, &query_embedding, top_k);
            }
            tracing::warn!("query embedding unavailable, falling back to keyword retrieval");
        }

        rank_by_keywords(&lessons, query, top_k)
    }

    pub fn delete_lesson(&self, id: &str) -> Result<bool, ForgeError> {
        let store = self.store.lock().map_err(poisoned)?;
        store.delete(id)
    }

    pub fn list_lessons(&self, limit: Option<usize>) -> Result<Vec<Lesson>, ForgeError> {
        let store = self.store.lock().map_err(poisoned)?;
        store.list(limit)
    }

    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        let router = self.router.as_ref()?;
        match router.embed(text).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                tracing::warn!(error = %e, "embedding failed");
                None
            }
        }
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> ForgeError {
    ForgeError::Config(format!("lesson store lock poisoned: {}", e))
}

fn rank_by_similarity(lessons: &[Lesson], query_embedding: &[f32], top_k: usize) -> String {
    let mut scored: Vec<(&Lesson, f32)> = lessons
        .iter()
        .filter_map(|lesson| {
            let embedding = lesson.embedding.as_ref()?;
            Some((
                lesson,
                embeddings::cosine_similarity(query_embedding, embedding),
            ))
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    if scored.is_empty() {
        return NO_LESSONS_FOUND.to_string();
    }

    let mut formatted = String::from("### PREVIOUS LESSONS LEARNED:\n");
    for (lesson, similarity) in scored {
        formatted.push_str(&format!(
            "- **{}** (similarity: {:.2}): {}\n",
            lesson.topic, similarity, lesson.solution
        ));
    }
    formatted
}

fn rank_by_keywords(lessons: &[Lesson], query: &str, top_k: usize) -> String {
    let mut scored: Vec<(&Lesson, usize)> = lessons
        .iter()
        .map(|lesson| {
            let haystack = format!("{} {}", lesson.topic, lesson.context);
            (lesson, embeddings::shared_token_count(query, &haystack))
        })
        .filter(|(_, matches)| *matches > 0)
        .collect();

    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(top_k);

    if scored.is_empty() {
        return NO_LESSONS_FOUND.to_string();
    }

    let mut formatted = String::from("### PREVIOUS LESSONS LEARNED:\n");
    for (lesson, _) in scored {
        formatted.push_str(&format!("- **{}**: {}\n", lesson.topic, lesson.solution));
    }
    formatted
}
