// src/pipeline/state.rs — Factory state carried between stages

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::machine::Stage;
use crate::council::ReviewOpinion;
use crate::provider::{Message, TokenUsage};

/// Target environment for a factory run. PROD runs face a stricter quality
/// threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvMode {
    Dev,
    Prod,
}

impl EnvMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvMode::Dev => "DEV",
            EnvMode::Prod => "PROD",
        }
    }

    /// Parse an environment hint; any casing of "prod"/"dev" is accepted.
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "PROD" | "PRODUCTION" => Some(EnvMode::Prod),
            "DEV" | "DEVELOPMENT" => Some(EnvMode::Dev),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnvMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound trigger handed to the orchestrator by an external intake process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactoryRequest {
    pub requirement: String,
    pub env_hint: Option<EnvMode>,
    pub timestamp: DateTime<Utc>,
}

impl FactoryRequest {
    pub fn new(requirement: impl Into<String>) -> Self {
        Self {
            requirement: requirement.into(),
            env_hint: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_env_hint(mut self, env: EnvMode) -> Self {
        self.env_hint = Some(env);
        self
    }
}

/// The pipeline's working state. Owned by the orchestrator; stage nodes read
/// it and return partial updates which the orchestrator merges.
#[derive(Debug, Clone)]
pub struct FactoryState {
    pub messages: Vec<Message>,
    pub spec_document: String,
    pub env_mode: EnvMode,
    pub env_hint: Option<EnvMode>,
    pub stage: Stage,
    pub status: String,
    /// Incremented exactly once per Review execution; bounded by config.
    pub feedback_loops: u32,
    pub quality_score: u8,
    pub review_feedback: String,
    pub arbitration: String,
    pub memory_context: String,
    pub usage: TokenUsage,
    pub artifact: String,
    /// Opinions from every completed review round, for trend reporting.
    pub prior_opinions: Vec<ReviewOpinion>,
}

impl FactoryState {
    pub fn new(request: &FactoryRequest) -> Self {
        Self {
            messages: vec![Message::user(request.requirement.clone())],
            spec_document: String::new(),
            env_mode: EnvMode::Dev,
            env_hint: request.env_hint,
            stage: Stage::Intake,
            status: "Intake".into(),
            feedback_loops: 0,
            quality_score: 0,
            review_feedback: String::new(),
            arbitration: String::new(),
            memory_context: String::new(),
            usage: TokenUsage::default(),
            artifact: String::new(),
            prior_opinions: Vec::new(),
        }
    }

    /// Latest user-authored message, used to seed spec refinement.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::provider::Role::User)
            .map(|m| m.content.as_str())
    }

    /// Latest opinions from the most recent completed review round.
    pub fn latest_round(&self) -> &[ReviewOpinion] {
        let bench = crate::council::reviewer_count();
        if self.prior_opinions.len() < bench {
            return &self.prior_opinions;
        }
        &self.prior_opinions[self.prior_opinions.len() - bench..]
    }
}

/// Partial state produced by one stage node. The orchestrator merges it via
/// `apply`; unset fields leave the state untouched.
#[derive(Debug, Default)]
pub struct StageUpdate {
    pub status: String,
    pub usage: TokenUsage,
    pub spec_document: Option<String>,
    pub env_mode: Option<EnvMode>,
    pub memory_context: Option<String>,
    pub artifact: Option<String>,
    pub quality_score: Option<u8>,
    pub review_feedback: Option<String>,
    pub arbitration: Option<String>,
    pub new_opinions: Vec<ReviewOpinion>,
}

impl StageUpdate {
    pub fn apply(self, state: &mut FactoryState) {
        state.status = self.status;
        state.usage = state.usage.merge(&self.usage);
        if let Some(spec) = self.spec_document {
            state.spec_document = spec;
        }
        if let Some(env) = self.env_mode {
            state.env_mode = env;
        }
        if let Some(ctx) = self.memory_context {
            state.memory_context = ctx;
        }
        if let Some(artifact) = self.artifact {
            state.artifact = artifact;
        }
        if let Some(score) = self.quality_score {
            state.quality_score = score;
        }
        if let Some(feedback) = self.review_feedback {
            state.review_feedback = feedback;
        }
        if let Some(arbitration) = self.arbitration {
            state.arbitration = arbitration;
        }
        state.prior_opinions.extend(self.new_opinions);
    }
}
