// src/pipeline/orchestrator.rs — Factory run controller
//
// Drives the stage machine over a single request: merges stage updates,
// increments the feedback-loop counter once per review, publishes a status
// snapshot after every node, and fires the approval side effects. Hard
// stage failures still produce a final ERROR snapshot before surfacing.

use std::path::PathBuf;
use std::sync::Arc;

use super::machine::{route_review, Stage};
use super::snapshot::{SnapshotWriter, StatusSnapshot};
use super::stages::StageRunner;
use super::state::{EnvMode, FactoryRequest, FactoryState};
use crate::infra::config::Config;
use crate::infra::errors::ForgeError;
use crate::integrations::ArtifactSink;
use crate::memory::LessonMemory;
use crate::provider::router::ModelRouter;
use crate::provider::TokenUsage;
use crate::util::truncate_str;

/// Summary of a completed (or safety-terminated) run.
#[derive(Debug, Clone)]
pub struct FactoryOutcome {
    pub stage: Stage,
    pub quality_score: u8,
    pub feedback_loops: u32,
    pub spec_document: String,
    pub artifact: String,
    pub usage: TokenUsage,
}

impl FactoryOutcome {
    pub fn approved(&self) -> bool {
        self.stage == Stage::Approved
    }
}

pub struct Orchestrator {
    runner: StageRunner,
    memory: Arc<LessonMemory>,
    config: Arc<Config>,
    sink: Option<Arc<dyn ArtifactSink>>,
    snapshots: SnapshotWriter,
    on_snapshot: Option<Box<dyn Fn(&StatusSnapshot) + Send + Sync>>,
}

impl Orchestrator {
    pub fn new(router: Arc<ModelRouter>, memory: Arc<LessonMemory>, config: Arc<Config>) -> Self {
        let snapshots = SnapshotWriter::new(&config.workspace.status_file);
        Self {
            runner: StageRunner::new(router, memory.clone(), config.clone()),
            memory,
            config,
            sink: None,
            snapshots,
            on_snapshot: None,
        }
    }

    /// Attach a destination for approved artifacts.
    pub fn with_sink(mut self, sink: Arc<dyn ArtifactSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Observe every published snapshot in-process, in addition to the
    /// status file.
    pub fn with_on_snapshot(
        mut self,
        cb: impl Fn(&StatusSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.on_snapshot = Some(Box::new(cb));
        self
    }

    fn publish(&self, state: &FactoryState) {
        let snapshot = StatusSnapshot::capture(state);
        self.snapshots.write(&snapshot);
        if let Some(ref cb) = self.on_snapshot {
            cb(&snapshot);
        }
    }

    /// Record a hard stage failure in the final snapshot, then surface it.
    fn fail(&self, state: &mut FactoryState, err: ForgeError) -> ForgeError {
        tracing::error!(stage = state.stage.as_str(), error = %err, "stage failed");
        let err = ForgeError::Stage {
            stage: state.stage.as_str().into(),
            message: err.to_string(),
        };
        state.status = format!("ERROR: {}", err);
        self.publish(state);
        err
    }

    /// Run one requirement through the full pipeline.
    pub async fn run(&self, request: FactoryRequest) -> Result<FactoryOutcome, ForgeError> {
        let mut state = FactoryState::new(&request);
        tracing::info!(requirement = %truncate_str(&request.requirement, 120), "factory run started");
        self.publish(&state);

        state.stage = Stage::SpecRefine;
        match self.runner.refine_spec(&state).await {
            Ok(update) => update.apply(&mut state),
            Err(e) => return Err(self.fail(&mut state, e)),
        }
        self.publish(&state);

        state.stage = Stage::EnvSetup;
        match self.runner.setup_env(&state).await {
            Ok(update) => update.apply(&mut state),
            Err(e) => return Err(self.fail(&mut state, e)),
        }
        self.publish(&state);

        loop {
            state.stage = Stage::Generate;
            match self.runner.generate(&state).await {
                Ok(update) => update.apply(&mut state),
                Err(e) => return Err(self.fail(&mut state, e)),
            }
            if let Err(e) = self.write_workspace(&state) {
                return Err(self.fail(&mut state, e));
            }
            self.publish(&state);

            state.stage = Stage::Review;
            let update = self.runner.review(&state).await;
            update.apply(&mut state);
            state.feedback_loops += 1;
            self.publish(&state);

            match route_review(
                state.quality_score,
                state.env_mode,
                state.feedback_loops,
                &self.config.pipeline,
            ) {
                Stage::Approved => {
                    state.stage = Stage::Approved;
                    state.status = "Approved".into();
                    self.approve(&state).await;
                    self.publish(&state);
                    break;
                }
                Stage::FailedSafety => {
                    state.stage = Stage::FailedSafety;
                    state.status = format!(
                        "Failed safety bound after {} review loops",
                        state.feedback_loops
                    );
                    self.publish(&state);
                    break;
                }
                _ => {
                    tracing::info!(
                        loops = state.feedback_loops,
                        score = state.quality_score,
                        "looping back to generation"
                    );
                }
            }
        }

        Ok(FactoryOutcome {
            stage: state.stage,
            quality_score: state.quality_score,
            feedback_loops: state.feedback_loops,
            spec_document: state.spec_document,
            artifact: state.artifact,
            usage: state.usage,
        })
    }

    /// Workspace artifact path, keyed by environment mode.
    pub fn artifact_filename(env: EnvMode) -> String {
        format!("app_{}.py", env.as_str().to_lowercase())
    }

    fn write_workspace(&self, state: &FactoryState) -> Result<(), ForgeError> {
        let dir = PathBuf::from(&self.config.workspace.dir);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(Self::artifact_filename(state.env_mode));
        std::fs::write(&path, &state.artifact)?;
        tracing::info!(path = %path.display(), "artifact written");
        Ok(())
    }

    /// Approval side effects: archive a lesson and push the artifact.
    /// Both are best-effort; failures are logged and do not change the
    /// terminal state.
    async fn approve(&self, state: &FactoryState) {
        tracing::info!(score = state.quality_score, "approval granted, archiving lesson");

        let context = format!("{}...", truncate_str(&state.spec_document, 50));
        let solution = format!(
            "Council approved at {}/100 - {}",
            state.quality_score,
            truncate_str(&state.arbitration, 100)
        );
        if let Err(e) = self
            .memory
            .store_lesson("Feature Implementation", &context, "Success", &solution)
            .await
        {
            tracing::error!(error = %e, "failed to store lesson");
        }

        if let Some(ref sink) = self.sink {
            let filename = Self::artifact_filename(state.env_mode);
            let message = format!("Update {} by ForgeFlow", filename);
            if let Err(e) = sink.push(&filename, &state.artifact, &message).await {
                tracing::error!(error = %e, "artifact push failed");
            }
        }
    }
}
