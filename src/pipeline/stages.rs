// src/pipeline/stages.rs — Stage node implementations
//
// Each node reads the current state and returns a partial update; the
// orchestrator owns merging and sequencing. Nodes talk to the outside world
// only through the injected router, memory, and council.

use std::sync::Arc;

use crate::council::CouncilEngine;
use crate::infra::config::Config;
use crate::infra::errors::ForgeError;
use crate::memory::LessonMemory;
use crate::pipeline::state::{EnvMode, FactoryState, StageUpdate};
use crate::provider::router::{ModelRouter, PipelineRole};
use crate::util::{strip_code_fences, truncate_str};

pub struct StageRunner {
    router: Arc<ModelRouter>,
    memory: Arc<LessonMemory>,
    council: CouncilEngine,
    config: Arc<Config>,
}

impl StageRunner {
    pub fn new(router: Arc<ModelRouter>, memory: Arc<LessonMemory>, config: Arc<Config>) -> Self {
        let council = CouncilEngine::new(router.clone());
        Self {
            router,
            memory,
            council,
            config,
        }
    }

    /// SpecRefine: turn the latest user requirement into a specification.
    /// A provider failure here aborts the run.
    pub async fn refine_spec(&self, state: &FactoryState) -> Result<StageUpdate, ForgeError> {
        let requirement = state.last_user_message().unwrap_or("No input provided.");

        let prompt = format!(
            "Generate a strict SPEC.md for this request: {}",
            requirement
        );
        let (spec, usage) = self
            .router
            .call(
                PipelineRole::SpecAuthor,
                &prompt,
                "You are a precise product owner. Write complete, unambiguous specifications.",
                None,
            )
            .await?;

        tracing::info!(chars = spec.len(), "specification drafted");

        Ok(StageUpdate {
            status: "Refining specification".into(),
            usage,
            spec_document: Some(spec),
            ..Default::default()
        })
    }

    /// EnvSetup: retrieve lesson context and decide the target environment.
    /// An explicit hint on the request wins; otherwise the planner model
    /// decides, defaulting to DEV when the call fails.
    pub async fn setup_env(&self, state: &FactoryState) -> Result<StageUpdate, ForgeError> {
        let memory_context = self
            .memory
            .retrieve_context(&state.spec_document, self.config.memory.top_k)
            .await;
        tracing::info!(chars = memory_context.len(), "retrieved lesson context");

        let mut usage = crate::provider::TokenUsage::default();
        let env_mode = if let Some(hint) = state.env_hint {
            tracing::info!(env = hint.as_str(), "environment fixed by request hint");
            hint
        } else {
            let prompt = format!(
                "Based on this compiled spec, does the user want a Production-ready \
                 system or a Prototype? Return ONLY 'PROD' or 'DEV'.\n\nSPEC EXCERPT:\n{}",
                truncate_str(&state.spec_document, 500)
            );
            match self
                .router
                .call(
                    PipelineRole::EnvPlanner,
                    &prompt,
                    "You are a tech lead. Output only PROD or DEV.",
                    None,
                )
                .await
            {
                Ok((decision, call_usage)) => {
                    usage = call_usage;
                    if decision.to_ascii_uppercase().contains("PROD") {
                        EnvMode::Prod
                    } else {
                        EnvMode::Dev
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "environment decision failed, defaulting to DEV");
                    EnvMode::Dev
                }
            }
        };

        tracing::info!(env = env_mode.as_str(), "environment selected");

        Ok(StageUpdate {
            status: "Environment setup".into(),
            usage,
            env_mode: Some(env_mode),
            memory_context: Some(memory_context),
            ..Default::default()
        })
    }

    /// Generate: produce the artifact from the spec, folding in lesson
    /// context and, on loop-back, the previous attempt plus review feedback.
    /// A provider failure here aborts the run.
    pub async fn generate(&self, state: &FactoryState) -> Result<StageUpdate, ForgeError> {
        let mut prompt = format!(
            "Write the complete Python code for the following specification. \
             Return ONLY the code, no markdown.\n\nSPEC:\n{}",
            state.spec_document
        );

        if !state.memory_context.is_empty() {
            prompt.push_str(&format!("\n\n{}", state.memory_context));
        }

        if !state.artifact.is_empty() {
            prompt.push_str(&format!(
                "\n\nPREVIOUS ATTEMPT:\n{}\n\nREVIEW FEEDBACK TO ADDRESS:\n{}",
                state.artifact, state.review_feedback
            ));
        }

        let (raw, usage) = self
            .router
            .call(
                PipelineRole::Generator,
                &prompt,
                "You are a senior developer. Write clean, production-ready code.",
                None,
            )
            .await?;

        let artifact = strip_code_fences(&raw);

        for warning in scan_generated_code(&artifact) {
            tracing::warn!(warning, "generated code flagged");
        }

        tracing::info!(chars = artifact.len(), "artifact generated");

        Ok(StageUpdate {
            status: "Generating artifact".into(),
            usage,
            artifact: Some(artifact),
            ..Default::default()
        })
    }

    /// Review: run the council. Never fails; reviewer failures surface as
    /// sentinel opinions inside the verdict.
    pub async fn review(&self, state: &FactoryState) -> StageUpdate {
        let artifact = if state.artifact.is_empty() {
            None
        } else {
            Some(state.artifact.as_str())
        };

        let verdict = self
            .council
            .review(&state.spec_document, artifact, state.latest_round())
            .await;

        tracing::info!(score = verdict.final_score, "council verdict");
        tracing::info!("\n{}", verdict.report);

        StageUpdate {
            status: "Council review".into(),
            usage: verdict.usage.clone(),
            quality_score: Some(verdict.final_score),
            review_feedback: Some(verdict.feedback.clone()),
            arbitration: Some(verdict.arbitration.clone()),
            new_opinions: verdict.opinions,
            ..Default::default()
        }
    }
}

/// Flag dangerous constructs in generated code. Warning-only; the factory
/// never executes what it generates, but operators reviewing the workspace
/// should see the flags.
pub fn scan_generated_code(code: &str) -> Vec<String> {
    const PATTERNS: &[(&str, &str)] = &[
        ("os.system(", "os.system() - command execution"),
        ("subprocess.", "subprocess module - process execution"),
        ("eval(", "eval() - code evaluation"),
        ("exec(", "exec() - code execution"),
        ("__import__(", "__import__() - dynamic imports"),
        ("shutil.rmtree", "shutil.rmtree() - recursive deletion"),
        ("os.remove", "os.remove() - file deletion"),
        ("os.unlink", "os.unlink() - file deletion"),
    ];

    PATTERNS
        .iter()
        .filter(|(needle, _)| code.contains(needle))
        .map(|(_, description)| format!("Potentially dangerous code detected: {}", description))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_flags_dangerous_calls() {
        let code = "import os\nos.system('rm -rf /')\n";
        let warnings = scan_generated_code(code);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("os.system"));
    }

    #[test]
    fn test_scan_clean_code_no_warnings() {
        let code = "def add(a, b):\n    return a + b\n";
        assert!(scan_generated_code(code).is_empty());
    }

    #[test]
    fn test_scan_multiple_patterns() {
        let code = "subprocess.run(['ls'])\neval(user_input)";
        assert_eq!(scan_generated_code(code).len(), 2);
    }
}
