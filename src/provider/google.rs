// src/provider/google.rs — Google Generative Language (Gemini) transport

use async_trait::async_trait;
use std::time::Duration;

use super::{ChatRequest, ChatResponse, ModelProvider, Role, TokenUsage};
use crate::infra::errors::ForgeError;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    api_key: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(90))
                .build()
                .unwrap_or_default(),
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut contents: Vec<serde_json::Value> = Vec::new();

        for m in &request.messages {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "model",
                Role::System => continue, // handled via system_instruction
            };

            contents.push(serde_json::json!({
                "role": role,
                "parts": [{ "text": m.content }],
            }));
        }

        let mut body = serde_json::json!({
            "contents": contents,
        });

        if let Some(ref system) = request.system {
            body["system_instruction"] = serde_json::json!({
                "parts": [{ "text": system }],
            });
        }

        let mut gen_config = serde_json::json!({});
        if let Some(max_tokens) = request.max_tokens {
            gen_config["maxOutputTokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            gen_config["temperature"] = serde_json::json!(temp);
        }
        if gen_config != serde_json::json!({}) {
            body["generationConfig"] = gen_config;
        }

        body
    }
}

#[async_trait]
impl ModelProvider for GoogleProvider {
    fn id(&self) -> &str {
        "google"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ForgeError> {
        let body = self.build_request_body(&request);

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            BASE_URL, request.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::Provider {
                provider: "google".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ForgeError::RateLimited {
                provider: "google".into(),
                retry_after_ms: 5000,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ForgeError::Provider {
                provider: "google".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| ForgeError::Provider {
            provider: "google".into(),
            message: format!("Failed to parse response: {}", e),
            retriable: false,
        })?;

        let content = resp["candidates"][0]["content"]["parts"]
            .as_array()
            .unwrap_or(&vec![])
            .iter()
            .map(|p| p["text"].as_str().unwrap_or(""))
            .collect::<Vec<_>>()
            .join("");

        // usageMetadata is occasionally absent from Gemini responses;
        // zero-fill rather than fail the call.
        let usage = TokenUsage::new(
            resp["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0),
            resp["usageMetadata"]["candidatesTokenCount"]
                .as_u64()
                .unwrap_or(0),
            resp["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0),
        );

        Ok(ChatResponse { content, usage })
    }

    async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ForgeError> {
        let mut out = Vec::with_capacity(texts.len());

        for text in texts {
            let url = format!(
                "{}/models/text-embedding-004:embedContent?key={}",
                BASE_URL, self.api_key
            );
            let body = serde_json::json!({
                "model": "models/text-embedding-004",
                "content": { "parts": [{ "text": text }] },
            });

            let response = self
                .client
                .post(&url)
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| ForgeError::Provider {
                    provider: "google".into(),
                    message: e.to_string(),
                    retriable: e.is_timeout() || e.is_connect(),
                })?;

            let status = response.status();
            if !status.is_success() {
                let error_body = response.text().await.unwrap_or_default();
                return Err(ForgeError::Provider {
                    provider: "google".into(),
                    message: format!("HTTP {}: {}", status, error_body),
                    retriable: status.is_server_error(),
                });
            }

            let resp: serde_json::Value =
                response.json().await.map_err(|e| ForgeError::Provider {
                    provider: "google".into(),
                    message: format!("Failed to parse embedding response: {}", e),
                    retriable: false,
                })?;

            let values = resp["embedding"]["values"]
                .as_array()
                .ok_or_else(|| ForgeError::Provider {
                    provider: "google".into(),
                    message: "Embedding response missing values".into(),
                    retriable: false,
                })?
                .iter()
                .map(|v| v.as_f64().unwrap_or(0.0) as f32)
                .collect();

            out.push(values);
        }

        Ok(out)
    }
}
