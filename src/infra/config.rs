// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub workspace: WorkspaceConfig,

    #[serde(default)]
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Review iterations allowed before the safety exit fires.
    pub max_feedback_loops: u32,
    /// Score a DEV run must strictly exceed to be approved.
    pub dev_quality_threshold: u8,
    /// Score a PROD run must strictly exceed to be approved.
    pub prod_quality_threshold: u8,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_feedback_loops: 5,
            dev_quality_threshold: 75,
            prod_quality_threshold: 95,
        }
    }
}

/// Per-role model overrides in "provider/model" form. Roles left unset use
/// the built-in assignments in `provider::router`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub spec_author: Option<String>,
    pub env_planner: Option<String>,
    pub generator: Option<String>,
    pub reviewer_claude: Option<String>,
    pub reviewer_gemini: Option<String>,
    pub reviewer_gpt: Option<String>,
    pub arbitrator: Option<String>,
    pub embedder: Option<String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            spec_author: None,
            env_planner: None,
            generator: None,
            reviewer_claude: None,
            reviewer_gemini: None,
            reviewer_gpt: None,
            arbitrator: None,
            embedder: Some("google/text-embedding-004".into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Lesson database path; empty string means the default data dir.
    pub db_path: String,
    /// Lessons returned per retrieval.
    pub top_k: usize,
    /// Whether to compute embeddings for new lessons.
    pub embeddings: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            db_path: String::new(),
            top_k: 5,
            embeddings: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory where generated artifacts are written.
    pub dir: String,
    /// Status snapshot file consumed by external dashboards.
    pub status_file: String,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: "workspace".into(),
            status_file: "status.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Push approved artifacts to GitHub. Requires GITHUB_TOKEN.
    pub enabled: bool,
    /// Target repository in "owner/name" form.
    pub repo: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            repo: String::new(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
