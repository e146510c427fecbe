// src/integrations/github.rs — GitHub contents-API artifact sink

use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use super::ArtifactSink;
use crate::infra::errors::ForgeError;

const API_BASE: &str = "https://api.github.com";

/// Pushes approved artifacts to a repository via the contents API. Each
/// push is one create-or-update commit against the default branch.
pub struct GithubSink {
    repo: String,
    token: String,
    client: reqwest::Client,
}

impl GithubSink {
    pub fn new(repo: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            token: token.into(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .user_agent("forgeflow")
                .build()
                .unwrap_or_default(),
        }
    }

    /// SHA of the existing file, if any. Needed by the update path of the
    /// contents API.
    async fn existing_sha(&self, path: &str) -> Option<String> {
        let url = format!("{}/repos/{}/contents/{}", API_BASE, self.repo, path);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let body: serde_json::Value = response.json().await.ok()?;
        body["sha"].as_str().map(|s| s.to_string())
    }
}

#[async_trait]
impl ArtifactSink for GithubSink {
    async fn push(
        &self,
        path: &str,
        content: &str,
        commit_message: &str,
    ) -> Result<(), ForgeError> {
        let url = format!("{}/repos/{}/contents/{}", API_BASE, self.repo, path);

        let mut body = serde_json::json!({
            "message": commit_message,
            "content": base64::engine::general_purpose::STANDARD.encode(content),
        });
        if let Some(sha) = self.existing_sha(path).await {
            body["sha"] = serde_json::json!(sha);
        }

        let response = self
            .client
            .put(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Provider {
                provider: "github".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Provider {
                provider: "github".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        tracing::info!(path, repo = %self.repo, "artifact pushed");
        Ok(())
    }
}
