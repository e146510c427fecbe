// src/infra/errors.rs — Error types for ForgeFlow

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForgeError {
    // Provider errors (transport, auth, malformed payload)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Missing credential: set {env_var} to use the '{provider}' provider")]
    MissingCredential { provider: String, env_var: String },

    // Pipeline errors
    #[error("Stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ForgeError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ForgeError::Provider {
                retriable: true,
                ..
            } | ForgeError::RateLimited { .. }
        )
    }
}
