// src/council/mod.rs — Multi-model review and arbitration

pub mod parser;
pub mod report;

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::provider::router::{ModelRouter, PipelineRole};
use crate::provider::TokenUsage;
use crate::util::truncate_str;

/// Score assigned to a reviewer whose call failed.
pub const SENTINEL_SCORE: u8 = 50;

/// One reviewer's structured verdict. Immutable after creation; retained
/// across feedback loops for trend reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewOpinion {
    pub reviewer: String,
    pub model: String,
    pub score: u8,
    pub reasoning: String,
    pub concerns: Vec<String>,
}

/// Aggregated outcome of one council round.
#[derive(Debug, Clone)]
pub struct CouncilVerdict {
    pub final_score: u8,
    pub arbitration: String,
    pub opinions: Vec<ReviewOpinion>,
    pub report: String,
    pub feedback: String,
    pub usage: TokenUsage,
}

/// The fixed reviewer bench. Order is stable so reports and trend deltas
/// line up across rounds.
const REVIEWERS: &[(&str, PipelineRole)] = &[
    ("Claude", PipelineRole::ReviewerClaude),
    ("Gemini", PipelineRole::ReviewerGemini),
    ("GPT", PipelineRole::ReviewerGpt),
];

/// Size of the reviewer bench; every round produces exactly this many
/// opinions, sentinels included.
pub fn reviewer_count() -> usize {
    REVIEWERS.len()
}

const REVIEW_SYSTEM: &str = "You are a strict code auditor. Be thorough and critical.";
const ARBITRATION_SYSTEM: &str = "You are the lead arbitrator. Synthesize opinions objectively.";

/// Gathers independent reviews from the bench, then arbitrates them into a
/// single score. A failed reviewer becomes a sentinel opinion; a failed
/// arbitration becomes the floor average. The council itself never fails.
pub struct CouncilEngine {
    router: Arc<ModelRouter>,
}

impl CouncilEngine {
    pub fn new(router: Arc<ModelRouter>) -> Self {
        Self { router }
    }

    /// Run a full council round: fan out the independent reviews, join,
    /// then arbitrate.
    pub async fn review(
        &self,
        spec: &str,
        artifact: Option<&str>,
        prior: &[ReviewOpinion],
    ) -> CouncilVerdict {
        tracing::info!(reviewers = REVIEWERS.len(), "gathering independent reviews");
        let (opinions, mut usage) = self.gather_reviews(spec, artifact, prior).await;

        tracing::info!("running arbitration");
        let (final_score, arbitration, arb_usage) = self.arbitrate(spec, &opinions).await;
        usage = usage.merge(&arb_usage);

        let report = report::generate_report(&opinions, prior, final_score, &arbitration);
        let feedback = report::format_feedback(&opinions);

        CouncilVerdict {
            final_score,
            arbitration,
            opinions,
            report,
            feedback,
            usage,
        }
    }

    /// Phase 1: one call per reviewer, issued concurrently. Reviewers have
    /// no data dependency on each other; a single failure is replaced with
    /// a sentinel so arbitration always sees a full bench.
    async fn gather_reviews(
        &self,
        spec: &str,
        artifact: Option<&str>,
        prior: &[ReviewOpinion],
    ) -> (Vec<ReviewOpinion>, TokenUsage) {
        let prompt = review_prompt(spec, artifact, prior);

        let calls = REVIEWERS.iter().map(|&(reviewer, role)| {
            let prompt = prompt.clone();
            async move {
                match self.router.call(role, &prompt, REVIEW_SYSTEM, None).await {
                    Ok((response, usage)) => {
                        let fields = parser::parse_review(&response);
                        let opinion = ReviewOpinion {
                            reviewer: reviewer.to_string(),
                            model: self.router.model_for(role),
                            score: fields.score,
                            reasoning: fields.reasoning,
                            concerns: fields.concerns,
                        };
                        tracing::info!(
                            reviewer,
                            score = opinion.score,
                            concerns = opinion.concerns.len(),
                            "review received"
                        );
                        (opinion, usage)
                    }
                    Err(e) => {
                        tracing::error!(reviewer, error = %e, "reviewer call failed, substituting sentinel");
                        let message = e.to_string();
                        let opinion = ReviewOpinion {
                            reviewer: reviewer.to_string(),
                            model: "error".into(),
                            score: SENTINEL_SCORE,
                            reasoning: format!("Review failed: {}", truncate_str(&message, 50)),
                            concerns: vec!["Review error".into()],
                        };
                        (opinion, TokenUsage::default())
                    }
                }
            }
        });

        let mut opinions = Vec::with_capacity(REVIEWERS.len());
        let mut usage = TokenUsage::default();
        for (opinion, call_usage) in join_all(calls).await {
            usage = usage.merge(&call_usage);
            opinions.push(opinion);
        }

        (opinions, usage)
    }

    /// Phase 2: a single synthesizing call over all opinions. On failure the
    /// verdict falls back to the integer-floor average of phase-1 scores.
    async fn arbitrate(
        &self,
        spec: &str,
        opinions: &[ReviewOpinion],
    ) -> (u8, String, TokenUsage) {
        let prompt = arbitration_prompt(spec, opinions);

        match self
            .router
            .call(PipelineRole::Arbitrator, &prompt, ARBITRATION_SYSTEM, None)
            .await
        {
            Ok((response, usage)) => {
                let score = parser::extract_score(&response);
                let reasoning = parser::extract_reasoning(&response);
                (score, reasoning, usage)
            }
            Err(e) => {
                tracing::error!(error = %e, "arbitration failed, falling back to average");
                (
                    floor_average(opinions),
                    format!("Arbitration failed, using reviewer average: {}", e),
                    TokenUsage::default(),
                )
            }
        }
    }
}

/// Integer-floor average of the bench's scores; 0 for an empty bench.
pub fn floor_average(opinions: &[ReviewOpinion]) -> u8 {
    if opinions.is_empty() {
        return 0;
    }
    let sum: u32 = opinions.iter().map(|op| op.score as u32).sum();
    (sum / opinions.len() as u32) as u8
}

/// Shared evaluation-criteria template. Every reviewer sees the same prompt
/// so their scores are comparable; artifact and history sections appear only
/// when present.
fn review_prompt(spec: &str, artifact: Option<&str>, prior: &[ReviewOpinion]) -> String {
    let mut prompt = format!(
        "You are reviewing a specification and its implementation.\n\n\
         SPECIFICATION:\n{}\n",
        truncate_str(spec, 1500)
    );

    if let Some(artifact) = artifact {
        prompt.push_str(&format!(
            "\nCURRENT IMPLEMENTATION:\n{}\n",
            truncate_str(artifact, 2000)
        ));
    }

    if !prior.is_empty() {
        prompt.push_str("\nPREVIOUS REVIEW ROUND:\n");
        for op in prior {
            prompt.push_str(&format!(
                "- {} scored {}/100; concerns: {}\n",
                op.reviewer,
                op.score,
                if op.concerns.is_empty() {
                    "none".to_string()
                } else {
                    op.concerns.join(", ")
                }
            ));
        }
        prompt.push_str("Assess whether the previous concerns were addressed.\n");
    }

    prompt.push_str(
        "\nEVALUATION CRITERIA:\n\
         1. Clarity - Is the specification clear and unambiguous?\n\
         2. Security - Does it address security concerns?\n\
         3. Robustness - Is it designed for reliability and edge cases?\n\
         4. Completeness - Are all necessary details included?\n\n\
         Provide your review in this exact format:\n\
         SCORE: [integer 0-100]\n\
         REASONING: [1-2 sentences explaining your score]\n\
         CONCERNS: [comma-separated list of specific concerns, or \"None\"]",
    );

    prompt
}

/// Arbitration prompt enumerating every opinion verbatim.
fn arbitration_prompt(spec: &str, opinions: &[ReviewOpinion]) -> String {
    let opinions_text = opinions
        .iter()
        .map(|op| {
            format!(
                "**{} ({})**\nScore: {}/100\nReasoning: {}\nConcerns: {}",
                op.reviewer,
                op.model,
                op.score,
                op.reasoning,
                if op.concerns.is_empty() {
                    "None".to_string()
                } else {
                    op.concerns.join(", ")
                }
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are the lead arbitrator in a code review council.\n\n\
         Expert reviewers have evaluated a specification. Synthesize their\n\
         opinions into a final, definitive quality score.\n\n\
         SPECIFICATION EXCERPT:\n{}\n\n\
         REVIEWER OPINIONS:\n{}\n\n\
         Consider:\n\
         - Areas of agreement and disagreement\n\
         - Severity of concerns raised\n\
         - Overall consensus\n\
         - Your own expert judgment\n\n\
         Provide your arbitration in this exact format:\n\
         FINAL_SCORE: [integer 0-100]\n\
         REASONING: [2-3 sentences explaining your final decision]",
        truncate_str(spec, 800),
        opinions_text
    )
}
