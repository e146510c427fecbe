// tests/council_test.rs — Council engine with mock providers

use std::sync::Arc;

use async_trait::async_trait;

use forgeflow::council::{reviewer_count, CouncilEngine, ReviewOpinion, SENTINEL_SCORE};
use forgeflow::infra::config::ModelsConfig;
use forgeflow::infra::errors::ForgeError;
use forgeflow::provider::router::{ModelRouter, ProviderKind};
use forgeflow::provider::{ChatRequest, ChatResponse, ModelProvider, TokenUsage};

/// Mock transport driven by a closure over the incoming request.
struct MockProvider {
    id: &'static str,
    on_chat: Box<dyn Fn(&ChatRequest) -> Result<ChatResponse, ForgeError> + Send + Sync>,
}

impl MockProvider {
    fn new(
        id: &'static str,
        on_chat: impl Fn(&ChatRequest) -> Result<ChatResponse, ForgeError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            on_chat: Box::new(on_chat),
        })
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn id(&self) -> &str {
        self.id
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ForgeError> {
        (self.on_chat)(&request)
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ForgeError> {
        Ok(vec![vec![0.0; 3]; texts.len()])
    }
}

fn respond(content: &str) -> Result<ChatResponse, ForgeError> {
    Ok(ChatResponse {
        content: content.to_string(),
        usage: TokenUsage::new(10, 5, 15),
    })
}

fn transport_error(provider: &str) -> ForgeError {
    ForgeError::Provider {
        provider: provider.into(),
        message: "connection refused".into(),
        retriable: true,
    }
}

fn council_with(
    anthropic: Arc<MockProvider>,
    google: Arc<MockProvider>,
    github: Arc<MockProvider>,
) -> CouncilEngine {
    let router = ModelRouter::from_env(&ModelsConfig::default())
        .with_transport(ProviderKind::Anthropic, anthropic)
        .with_transport(ProviderKind::Google, google)
        .with_transport(ProviderKind::GithubModels, github);
    CouncilEngine::new(Arc::new(router))
}

fn is_arbitration(request: &ChatRequest) -> bool {
    request.messages[0].content.contains("lead arbitrator")
}

#[tokio::test]
async fn test_full_round_uses_arbitrated_score() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            respond("FINAL_SCORE: 84\nREASONING: Consensus is strong.")
        } else {
            respond("SCORE: 88\nREASONING: Clear spec.\nCONCERNS: None")
        }
    });
    let google =
        MockProvider::new("google", |_| respond("SCORE: 80\nREASONING: Good.\nCONCERNS: missing tests"));
    let github =
        MockProvider::new("github-models", |_| respond("SCORE: 75\nREASONING: Fine.\nCONCERNS: None"));

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &[]).await;

    assert_eq!(verdict.final_score, 84);
    assert_eq!(verdict.arbitration, "Consensus is strong.");
    assert_eq!(verdict.opinions.len(), reviewer_count());
    assert_eq!(verdict.opinions[0].reviewer, "Claude");
    assert_eq!(verdict.opinions[0].score, 88);
    assert_eq!(verdict.opinions[1].score, 80);
    assert_eq!(verdict.opinions[2].score, 75);

    // four calls at 15 tokens each
    assert_eq!(verdict.usage.total_tokens, 60);
}

#[tokio::test]
async fn test_failed_reviewer_becomes_sentinel() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            respond("FINAL_SCORE: 70\nREASONING: One reviewer was unavailable.")
        } else {
            respond("SCORE: 82\nREASONING: Solid.\nCONCERNS: None")
        }
    });
    let google =
        MockProvider::new("google", |_| respond("SCORE: 78\nREASONING: Decent.\nCONCERNS: None"));
    let github = MockProvider::new("github-models", |_| Err(transport_error("github-models")));

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &[]).await;

    // partial reviewer failure does not block arbitration
    assert_eq!(verdict.opinions.len(), 3);
    let sentinel = &verdict.opinions[2];
    assert_eq!(sentinel.reviewer, "GPT");
    assert_eq!(sentinel.model, "error");
    assert_eq!(sentinel.score, SENTINEL_SCORE);
    assert_eq!(sentinel.concerns, vec!["Review error".to_string()]);
    assert!(sentinel.reasoning.starts_with("Review failed:"));

    assert_eq!(verdict.final_score, 70);
}

#[tokio::test]
async fn test_failed_arbitration_falls_back_to_floor_average() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            Err(transport_error("anthropic"))
        } else {
            respond("SCORE: 80\nREASONING: Ok.\nCONCERNS: None")
        }
    });
    let google =
        MockProvider::new("google", |_| respond("SCORE: 70\nREASONING: Ok.\nCONCERNS: None"));
    let github =
        MockProvider::new("github-models", |_| respond("SCORE: 63\nREASONING: Ok.\nCONCERNS: None"));

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &[]).await;

    // (80 + 70 + 63) / 3 = 71
    assert_eq!(verdict.final_score, 71);
    assert!(verdict.arbitration.contains("Arbitration failed"));
}

#[tokio::test]
async fn test_second_round_report_shows_trend() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            respond("FINAL_SCORE: 85\nREASONING: Improved.")
        } else {
            respond("SCORE: 85\nREASONING: Better.\nCONCERNS: None")
        }
    });
    let google =
        MockProvider::new("google", |_| respond("SCORE: 82\nREASONING: Better.\nCONCERNS: None"));
    let github =
        MockProvider::new("github-models", |_| respond("SCORE: 80\nREASONING: Better.\nCONCERNS: None"));

    let prior = vec![
        ReviewOpinion {
            reviewer: "Claude".into(),
            model: "m".into(),
            score: 60,
            reasoning: "Weak error handling.".into(),
            concerns: vec!["error handling".into()],
        },
        ReviewOpinion {
            reviewer: "Gemini".into(),
            model: "m".into(),
            score: 65,
            reasoning: "Thin tests.".into(),
            concerns: vec!["tests".into()],
        },
    ];

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &prior).await;

    assert!(verdict.report.contains("SCORE TREND"));
    assert!(verdict.report.contains("(+25)"), "report: {}", verdict.report);
}

#[tokio::test]
async fn test_first_round_report_has_no_trend() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            respond("FINAL_SCORE: 80\nREASONING: Fine.")
        } else {
            respond("SCORE: 80\nREASONING: Fine.\nCONCERNS: None")
        }
    });
    let google = MockProvider::new("google", |_| respond("SCORE: 80\nREASONING: Fine.\nCONCERNS: None"));
    let github =
        MockProvider::new("github-models", |_| respond("SCORE: 80\nREASONING: Fine.\nCONCERNS: None"));

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &[]).await;

    assert!(!verdict.report.contains("SCORE TREND"));
}

#[tokio::test]
async fn test_no_concerns_feedback_sentinel() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            respond("FINAL_SCORE: 92\nREASONING: Clean.")
        } else {
            respond("SCORE: 92\nREASONING: Clean.\nCONCERNS: None")
        }
    });
    let google = MockProvider::new("google", |_| respond("SCORE: 90\nREASONING: Clean.\nCONCERNS: None"));
    let github =
        MockProvider::new("github-models", |_| respond("SCORE: 91\nREASONING: Clean.\nCONCERNS: None"));

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &[]).await;

    assert_eq!(verdict.feedback, "No major issues were raised by the council.");
}

#[tokio::test]
async fn test_malformed_reviewer_output_degrades_to_defaults() {
    let anthropic = MockProvider::new("anthropic", |req| {
        if is_arbitration(req) {
            respond("FINAL_SCORE: 70\nREASONING: Mixed signal quality.")
        } else {
            respond("I think this is pretty good overall, nice work!")
        }
    });
    let google = MockProvider::new("google", |_| respond("SCORE: 70\nREASONING: Ok.\nCONCERNS: None"));
    let github =
        MockProvider::new("github-models", |_| respond("SCORE: 70\nREASONING: Ok.\nCONCERNS: None"));

    let council = council_with(anthropic, google, github);
    let verdict = council.review("Build a parser.", None, &[]).await;

    // free text with no markers parses to the documented defaults
    assert_eq!(verdict.opinions[0].score, 70);
    assert_eq!(verdict.opinions[0].reasoning, "");
    assert!(verdict.opinions[0].concerns.is_empty());
}
