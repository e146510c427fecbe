// src/pipeline/machine.rs — Stage graph and transition rules
//
// The topology is fixed: a linear chain with one feedback edge from Review
// back to Generate. Modeling it as an explicit enum keeps the two rules
// that matter front and center: the loop bound and the per-environment
// quality threshold.

use serde::{Deserialize, Serialize};

use super::state::EnvMode;
use crate::infra::config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Intake,
    SpecRefine,
    EnvSetup,
    Generate,
    Review,
    Approved,
    FailedSafety,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Intake => "Intake",
            Stage::SpecRefine => "SpecRefine",
            Stage::EnvSetup => "EnvSetup",
            Stage::Generate => "Generate",
            Stage::Review => "Review",
            Stage::Approved => "Approved",
            Stage::FailedSafety => "FailedSafety",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Approved | Stage::FailedSafety)
    }

    /// The linear edge out of a non-Review stage. Review's successor is
    /// decided by `route_review`.
    pub fn successor(&self) -> Option<Stage> {
        match self {
            Stage::Intake => Some(Stage::SpecRefine),
            Stage::SpecRefine => Some(Stage::EnvSetup),
            Stage::EnvSetup => Some(Stage::Generate),
            Stage::Generate => Some(Stage::Review),
            Stage::Review | Stage::Approved | Stage::FailedSafety => None,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide the transition out of Review.
///
/// The loop bound is checked before the score so total iteration count stays
/// bounded no matter how the score trends. Approval requires the score to
/// strictly exceed the threshold for the current environment.
pub fn route_review(
    score: u8,
    env: EnvMode,
    feedback_loops: u32,
    config: &PipelineConfig,
) -> Stage {
    if feedback_loops > config.max_feedback_loops {
        tracing::warn!(
            feedback_loops,
            max = config.max_feedback_loops,
            "feedback loop bound exceeded, terminating"
        );
        return Stage::FailedSafety;
    }

    let threshold = match env {
        EnvMode::Dev => config.dev_quality_threshold,
        EnvMode::Prod => config.prod_quality_threshold,
    };

    if score > threshold {
        tracing::info!(score, threshold, env = env.as_str(), "approved");
        Stage::Approved
    } else {
        tracing::info!(score, threshold, env = env.as_str(), "rejected, looping back");
        Stage::Generate
    }
}
