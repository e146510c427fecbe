// src/cli/mod.rs — CLI definition (clap derive)

use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::infra::config::Config;
use crate::infra::paths;
use crate::integrations::github::GithubSink;
use crate::memory::store::LessonStore;
use crate::memory::LessonMemory;
use crate::pipeline::snapshot::StatusSnapshot;
use crate::pipeline::{EnvMode, FactoryRequest, Orchestrator};
use crate::provider::router::ModelRouter;

#[derive(Parser)]
#[command(name = "forgeflow", about = "Multi-model AI software factory", version)]
pub struct Cli {
    /// Requirement to run through the factory (default command)
    #[arg(trailing_var_arg = true)]
    pub requirement: Vec<String>,

    /// Force the environment mode (dev or prod) instead of letting the
    /// planner decide
    #[arg(short, long)]
    pub env: Option<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect or prune the lesson store
    Lessons {
        #[command(subcommand)]
        action: LessonsAction,
    },
    /// Print the latest pipeline status snapshot
    Status,
}

#[derive(Subcommand, Clone)]
pub enum LessonsAction {
    /// List stored lessons, most recent first
    List {
        /// Maximum number of lessons to show
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Delete a lesson by id
    Delete { id: String },
}

fn open_memory(config: &Config) -> anyhow::Result<LessonMemory> {
    let db_path = if config.memory.db_path.is_empty() {
        paths::ensure_dirs()?;
        paths::db_path()
    } else {
        std::path::PathBuf::from(&config.memory.db_path)
    };
    Ok(LessonMemory::new(LessonStore::open(&db_path)?))
}

/// Run one requirement through the pipeline and print the outcome.
pub async fn run_factory(
    requirement: String,
    env: Option<String>,
    config: Config,
) -> anyhow::Result<()> {
    let env_hint = match env {
        Some(ref value) => Some(
            EnvMode::parse(value)
                .ok_or_else(|| anyhow::anyhow!("invalid --env '{}', expected dev or prod", value))?,
        ),
        None => None,
    };

    let config = Arc::new(config);
    let router = Arc::new(ModelRouter::from_env(&config.models));

    let mut memory = open_memory(&config)?;
    if config.memory.embeddings {
        memory = memory.with_router(router.clone());
    }
    let memory = Arc::new(memory);

    let mut orchestrator = Orchestrator::new(router, memory, config.clone());

    if config.github.enabled && !config.github.repo.is_empty() {
        match std::env::var("GITHUB_TOKEN") {
            Ok(token) if !token.is_empty() => {
                orchestrator = orchestrator
                    .with_sink(Arc::new(GithubSink::new(config.github.repo.clone(), token)));
            }
            _ => {
                tracing::warn!("github push enabled but GITHUB_TOKEN is not set, skipping sink");
            }
        }
    }

    let mut request = FactoryRequest::new(requirement);
    if let Some(hint) = env_hint {
        request = request.with_env_hint(hint);
    }

    let outcome = orchestrator.run(request).await?;

    println!();
    if outcome.approved() {
        println!(
            "Approved at {}/100 after {} review loop(s).",
            outcome.quality_score, outcome.feedback_loops
        );
    } else {
        println!(
            "Stopped at safety bound: {} review loop(s), last score {}/100.",
            outcome.feedback_loops, outcome.quality_score
        );
    }
    println!("Usage: {}", outcome.usage);

    Ok(())
}

pub fn run_lessons(action: LessonsAction, config: Config) -> anyhow::Result<()> {
    let memory = open_memory(&config)?;

    match action {
        LessonsAction::List { limit } => {
            let lessons = memory.list_lessons(Some(limit))?;
            if lessons.is_empty() {
                println!("No lessons stored yet.");
                return Ok(());
            }
            for lesson in lessons {
                println!(
                    "{}  {}  [{}]\n    {}",
                    lesson.created_at, lesson.topic, lesson.outcome, lesson.solution
                );
                println!("    id: {}", lesson.id);
            }
        }
        LessonsAction::Delete { id } => {
            if memory.delete_lesson(&id)? {
                println!("Deleted lesson {}.", id);
            } else {
                println!("No lesson with id {}.", id);
            }
        }
    }

    Ok(())
}

pub fn show_status(config: &Config) -> anyhow::Result<()> {
    let path = std::path::Path::new(&config.workspace.status_file);
    if !path.exists() {
        println!("No status snapshot yet. Run the factory first.");
        return Ok(());
    }

    let snapshot: StatusSnapshot = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    println!("Status:  {}", snapshot.current_status);
    println!("Stage:   {}", snapshot.stage);
    println!("Env:     {}", snapshot.env_mode);
    println!(
        "Score:   {}/100 (loop {})",
        snapshot.quality_score, snapshot.feedback_loop_count
    );
    println!("Tokens:  {}", snapshot.total_tokens);
    if !snapshot.spec_excerpt.is_empty() {
        println!("Spec:    {}", snapshot.spec_excerpt);
    }

    Ok(())
}
