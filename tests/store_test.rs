// tests/store_test.rs — Lesson store and retrieval

use std::sync::Arc;

use async_trait::async_trait;

use forgeflow::infra::config::ModelsConfig;
use forgeflow::infra::errors::ForgeError;
use forgeflow::memory::store::LessonStore;
use forgeflow::memory::{LessonMemory, NO_LESSONS_FOUND};
use forgeflow::provider::router::{ModelRouter, ProviderKind};
use forgeflow::provider::{ChatRequest, ChatResponse, ModelProvider};

fn memory() -> LessonMemory {
    LessonMemory::new(LessonStore::open_in_memory().unwrap())
}

#[tokio::test]
async fn test_round_trip_exact_topic_query() {
    let memory = memory();
    memory
        .store_lesson(
            "Python Testing",
            "unit test setup",
            "Success",
            "Use pytest fixtures",
        )
        .await
        .unwrap();
    memory
        .store_lesson(
            "JavaScript Testing",
            "unit test setup",
            "Success",
            "Use Jest",
        )
        .await
        .unwrap();

    let result = memory.retrieve_context("Python Testing", 5).await;
    assert!(result.contains("Python Testing"));
    assert!(result.contains("Use pytest fixtures"));
}

#[tokio::test]
async fn test_empty_store_sentinel() {
    let memory = memory();
    assert_eq!(memory.retrieve_context("anything", 5).await, NO_LESSONS_FOUND);
}

#[tokio::test]
async fn test_no_keyword_match_sentinel() {
    let memory = memory();
    memory
        .store_lesson("deploys", "kubernetes rollout", "Success", "use helm")
        .await
        .unwrap();

    let result = memory.retrieve_context("completely unrelated words", 5).await;
    assert_eq!(result, NO_LESSONS_FOUND);
}

#[tokio::test]
async fn test_top_k_limits_results() {
    let memory = memory();
    for i in 0..4 {
        memory
            .store_lesson(
                &format!("docker topic {}", i),
                "docker context",
                "Success",
                &format!("solution {}", i),
            )
            .await
            .unwrap();
    }

    let result = memory.retrieve_context("docker", 2).await;
    let hits = result.matches("- **").count();
    assert_eq!(hits, 2);
}

#[tokio::test]
async fn test_delete_by_id() {
    let memory = memory();
    let id = memory
        .store_lesson("topic", "context", "Success", "solution")
        .await
        .unwrap();

    assert!(memory.delete_lesson(&id).unwrap());
    assert!(!memory.delete_lesson(&id).unwrap());
    assert_eq!(memory.retrieve_context("topic", 5).await, NO_LESSONS_FOUND);
}

#[tokio::test]
async fn test_list_lessons_limit() {
    let memory = memory();
    for i in 0..3 {
        memory
            .store_lesson(&format!("t{}", i), "c", "Success", "s")
            .await
            .unwrap();
    }

    assert_eq!(memory.list_lessons(Some(2)).unwrap().len(), 2);
    assert_eq!(memory.list_lessons(None).unwrap().len(), 3);
}

// ─── embedding-backed retrieval ─────────────────────────────────

/// Embeds "alpha" texts along one axis and everything else along the other,
/// so similarity ranking is deterministic.
struct AxisEmbedder;

#[async_trait]
impl ModelProvider for AxisEmbedder {
    fn id(&self) -> &str {
        "google"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, ForgeError> {
        Err(ForgeError::Provider {
            provider: "google".into(),
            message: "chat not scripted".into(),
            retriable: false,
        })
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ForgeError> {
        Ok(texts
            .iter()
            .map(|t| {
                if t.contains("alpha") {
                    vec![1.0, 0.0]
                } else {
                    vec![0.0, 1.0]
                }
            })
            .collect())
    }
}

fn embedding_memory() -> LessonMemory {
    let router = ModelRouter::from_env(&ModelsConfig::default())
        .with_transport(ProviderKind::Google, Arc::new(AxisEmbedder));
    LessonMemory::new(LessonStore::open_in_memory().unwrap()).with_router(Arc::new(router))
}

#[tokio::test]
async fn test_embedding_retrieval_ranks_by_similarity() {
    let memory = embedding_memory();
    memory
        .store_lesson("alpha service", "alpha rollout", "Success", "alpha solution")
        .await
        .unwrap();
    memory
        .store_lesson("beta service", "beta rollout", "Success", "beta solution")
        .await
        .unwrap();

    let result = memory.retrieve_context("alpha deployment", 1).await;
    assert!(result.contains("alpha solution"), "result: {}", result);
    assert!(!result.contains("beta solution"));
    assert!(result.contains("similarity:"));
}

#[tokio::test]
async fn test_embedding_retrieval_still_returns_sentinel_when_empty() {
    let memory = embedding_memory();
    assert_eq!(memory.retrieve_context("alpha", 5).await, NO_LESSONS_FOUND);
}
