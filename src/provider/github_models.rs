// src/provider/github_models.rs — GitHub Models inference API transport
//
// OpenAI-compatible chat completions endpoint; serves the Grok and GPT
// reviewer models behind a single GITHUB_TOKEN.

use async_trait::async_trait;
use std::time::Duration;

use super::{ChatRequest, ChatResponse, ModelProvider, Role, TokenUsage};
use crate::infra::errors::ForgeError;

const API_URL: &str = "https://models.github.ai/inference/chat/completions";

pub struct GithubModelsProvider {
    token: String,
    client: reqwest::Client,
}

impl GithubModelsProvider {
    pub fn new(token: String) -> Self {
        Self {
            token,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut messages: Vec<serde_json::Value> = Vec::new();

        if let Some(system) = &request.system {
            messages.push(serde_json::json!({
                "role": "system",
                "content": system,
            }));
        }

        for m in &request.messages {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(serde_json::json!({
                "role": role,
                "content": m.content,
            }));
        }

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": messages,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }

        body
    }
}

#[async_trait]
impl ModelProvider for GithubModelsProvider {
    fn id(&self) -> &str {
        "github-models"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ForgeError> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(API_URL)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Provider {
                provider: "github-models".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ForgeError::RateLimited {
                provider: "github-models".into(),
                retry_after_ms: 5000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Provider {
                provider: "github-models".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| ForgeError::Provider {
            provider: "github-models".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let usage = TokenUsage::new(
            resp["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
            resp["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            resp["usage"]["total_tokens"].as_u64().unwrap_or(0),
        );

        Ok(ChatResponse { content, usage })
    }

    async fn embed(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, ForgeError> {
        Err(ForgeError::Provider {
            provider: "github-models".into(),
            message: "Embeddings are not routed through GitHub Models".into(),
            retriable: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Message;

    #[test]
    fn test_build_request_body_prepends_system() {
        let p = GithubModelsProvider::new("token".into());
        let body = p.build_request_body(&ChatRequest {
            model: "azure-openai/gpt-5".into(),
            messages: vec![Message::user("review this")],
            system: Some("You are a strict auditor.".into()),
            temperature: Some(0.4),
            max_tokens: None,
        });

        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(body["temperature"], 0.4);
    }
}
