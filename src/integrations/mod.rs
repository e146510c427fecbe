// src/integrations/mod.rs — External side-effect sinks

pub mod github;

use async_trait::async_trait;

use crate::infra::errors::ForgeError;

/// Destination for approved artifacts. Push is best-effort: the pipeline
/// reports failures but never re-runs a push or rolls back state.
#[async_trait]
pub trait ArtifactSink: Send + Sync {
    async fn push(
        &self,
        path: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), ForgeError>;
}
