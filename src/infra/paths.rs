// src/infra/paths.rs — Path management
//
// All paths respect the FORGEFLOW_HOME environment variable for isolation.
// When FORGEFLOW_HOME is set, config and data live under that directory.
// When unset, config uses ~/.forgeflow/ and data uses XDG_DATA_HOME/forgeflow.

use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::OnceLock;

static PROJECT_DIRS: OnceLock<ProjectDirs> = OnceLock::new();

fn project_dirs() -> &'static ProjectDirs {
    PROJECT_DIRS.get_or_init(|| {
        ProjectDirs::from("", "", "forgeflow").expect("Could not determine home directory")
    })
}

fn forgeflow_home() -> Option<PathBuf> {
    std::env::var_os("FORGEFLOW_HOME").map(PathBuf::from)
}

/// Configuration directory: $FORGEFLOW_HOME/ or ~/.forgeflow/
pub fn config_dir() -> PathBuf {
    if let Some(home) = forgeflow_home() {
        return home;
    }
    dirs_home().join(".forgeflow")
}

/// Data directory: $FORGEFLOW_HOME/data/ or XDG_DATA_HOME/forgeflow
pub fn data_dir() -> PathBuf {
    if let Some(home) = forgeflow_home() {
        return home.join("data");
    }
    project_dirs().data_local_dir().to_path_buf()
}

/// Home directory
pub fn dirs_home() -> PathBuf {
    directories::BaseDirs::new()
        .expect("Could not determine home directory")
        .home_dir()
        .to_path_buf()
}

/// Lesson database path
pub fn db_path() -> PathBuf {
    data_dir().join("forgeflow.db")
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Ensure all required directories exist
pub fn ensure_dirs() -> anyhow::Result<()> {
    for dir in [config_dir(), data_dir()] {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
