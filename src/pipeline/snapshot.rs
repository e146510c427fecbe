// src/pipeline/snapshot.rs — Status snapshots for external consumers
//
// The field set is fixed: external dashboards read this file directly, so
// renaming or removing a field is a breaking change.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::state::FactoryState;
use crate::provider::TokenUsage;
use crate::util::truncate_str;

const EXCERPT_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub current_status: String,
    pub stage: String,
    pub env_mode: String,
    pub quality_score: u8,
    pub feedback_loop_count: u32,
    pub spec_excerpt: String,
    pub last_message: String,
    pub total_tokens: TokenUsage,
}

impl StatusSnapshot {
    pub fn capture(state: &FactoryState) -> Self {
        Self {
            current_status: state.status.clone(),
            stage: state.stage.as_str().to_string(),
            env_mode: state.env_mode.as_str().to_string(),
            quality_score: state.quality_score,
            feedback_loop_count: state.feedback_loops,
            spec_excerpt: truncate_str(&state.spec_document, EXCERPT_LEN).to_string(),
            last_message: state
                .messages
                .last()
                .map(|m| truncate_str(&m.content, EXCERPT_LEN).to_string())
                .unwrap_or_default(),
            total_tokens: state.usage.clone(),
        }
    }
}

/// Writes snapshots to the configured status file. Write failures are
/// logged and swallowed: observability must never take the pipeline down.
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn write(&self, snapshot: &StatusSnapshot) {
        let json = match serde_json::to_string_pretty(snapshot) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize status snapshot");
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    tracing::error!(error = %e, "failed to create status directory");
                    return;
                }
            }
        }

        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::error!(error = %e, path = %self.path.display(), "failed to write status snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::state::FactoryRequest;

    #[test]
    fn test_capture_bounds_excerpts() {
        let request = FactoryRequest::new("x".repeat(500));
        let mut state = FactoryState::new(&request);
        state.spec_document = "s".repeat(500);

        let snapshot = StatusSnapshot::capture(&state);
        assert_eq!(snapshot.spec_excerpt.len(), EXCERPT_LEN);
        assert_eq!(snapshot.last_message.len(), EXCERPT_LEN);
    }

    #[test]
    fn test_capture_reflects_state() {
        let request = FactoryRequest::new("build it");
        let mut state = FactoryState::new(&request);
        state.quality_score = 82;
        state.feedback_loops = 2;

        let snapshot = StatusSnapshot::capture(&state);
        assert_eq!(snapshot.quality_score, 82);
        assert_eq!(snapshot.feedback_loop_count, 2);
        assert_eq!(snapshot.env_mode, "DEV");
        assert_eq!(snapshot.stage, "Intake");
        assert_eq!(snapshot.last_message, "build it");
    }

    #[test]
    fn test_writer_round_trips_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("status.json");
        let writer = SnapshotWriter::new(&path);

        let request = FactoryRequest::new("hello");
        let snapshot = StatusSnapshot::capture(&FactoryState::new(&request));
        writer.write(&snapshot);

        let loaded: StatusSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.last_message, "hello");
    }

    #[test]
    fn test_writer_swallows_bad_path() {
        // Writing into a path whose parent is a file must not panic.
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();

        let writer = SnapshotWriter::new(blocker.join("status.json"));
        let request = FactoryRequest::new("hello");
        writer.write(&StatusSnapshot::capture(&FactoryState::new(&request)));
    }
}
