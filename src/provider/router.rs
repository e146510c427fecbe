// src/provider/router.rs — Role-based multi-provider routing
//
// Maps logical pipeline roles to concrete provider/model/temperature
// configurations, resolved once at construction. Dispatch goes through a
// per-provider transport table; no string matching on model identifiers.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use super::anthropic::AnthropicProvider;
use super::github_models::GithubModelsProvider;
use super::google::GoogleProvider;
use super::{ChatRequest, Message, ModelProvider, ModelRef, TokenUsage};
use crate::infra::config::ModelsConfig;
use crate::infra::errors::ForgeError;

/// Logical pipeline functions. Each resolves to one backend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineRole {
    SpecAuthor,
    EnvPlanner,
    Generator,
    ReviewerClaude,
    ReviewerGemini,
    ReviewerGpt,
    Arbitrator,
    Embedder,
}

impl PipelineRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineRole::SpecAuthor => "spec_author",
            PipelineRole::EnvPlanner => "env_planner",
            PipelineRole::Generator => "generator",
            PipelineRole::ReviewerClaude => "reviewer_claude",
            PipelineRole::ReviewerGemini => "reviewer_gemini",
            PipelineRole::ReviewerGpt => "reviewer_gpt",
            PipelineRole::Arbitrator => "arbitrator",
            PipelineRole::Embedder => "embedder",
        }
    }
}

/// Backend APIs the router can dispatch to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    Anthropic,
    Google,
    GithubModels,
}

impl ProviderKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "anthropic" => Some(ProviderKind::Anthropic),
            "google" => Some(ProviderKind::Google),
            "github-models" | "github" => Some(ProviderKind::GithubModels),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Google => "google",
            ProviderKind::GithubModels => "github-models",
        }
    }

    fn env_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Google => "GOOGLE_API_KEY",
            ProviderKind::GithubModels => "GITHUB_TOKEN",
        }
    }
}

/// Concrete backend configuration for one role. Read-only at runtime;
/// overridable per call.
#[derive(Debug, Clone)]
pub struct RoleConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RoleConfig {
    pub fn new(provider: ProviderKind, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            max_tokens: 8192,
        }
    }
}

/// API credentials, read from the environment once at construction.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub anthropic_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub github_token: Option<String>,
}

impl Credentials {
    pub fn from_env() -> Self {
        Self {
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok().filter(|v| !v.is_empty()),
            google_api_key: std::env::var("GOOGLE_API_KEY").ok().filter(|v| !v.is_empty()),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|v| !v.is_empty()),
        }
    }

    fn get(&self, kind: ProviderKind) -> Option<&str> {
        match kind {
            ProviderKind::Anthropic => self.anthropic_api_key.as_deref(),
            ProviderKind::Google => self.google_api_key.as_deref(),
            ProviderKind::GithubModels => self.github_token.as_deref(),
        }
    }
}

/// Built-in role assignments. Overridable via the `[models]` config section.
fn default_role_table() -> HashMap<PipelineRole, RoleConfig> {
    use PipelineRole::*;
    use ProviderKind::*;

    let mut table = HashMap::new();
    table.insert(
        SpecAuthor,
        RoleConfig::new(Anthropic, "claude-sonnet-4-20250514", 0.3),
    );
    table.insert(EnvPlanner, RoleConfig::new(Google, "gemini-2.5-pro", 0.2));
    table.insert(
        Generator,
        RoleConfig::new(Anthropic, "claude-sonnet-4-20250514", 0.1),
    );
    table.insert(
        ReviewerClaude,
        RoleConfig::new(Anthropic, "claude-sonnet-4-20250514", 0.4),
    );
    table.insert(
        ReviewerGemini,
        RoleConfig::new(Google, "gemini-2.5-pro", 0.4),
    );
    table.insert(
        ReviewerGpt,
        RoleConfig::new(GithubModels, "azure-openai/gpt-5", 0.4),
    );
    table.insert(
        Arbitrator,
        RoleConfig::new(Anthropic, "claude-sonnet-4-20250514", 0.4),
    );
    table.insert(Embedder, RoleConfig::new(Google, "text-embedding-004", 0.0));
    table
}

/// Routes role-addressed model calls to the right backend transport and
/// normalizes usage metering. Transports are built lazily, at most once,
/// and shared across concurrent callers.
pub struct ModelRouter {
    table: HashMap<PipelineRole, RoleConfig>,
    default_config: RoleConfig,
    credentials: Credentials,
    anthropic: OnceLock<Arc<dyn ModelProvider>>,
    google: OnceLock<Arc<dyn ModelProvider>>,
    github: OnceLock<Arc<dyn ModelProvider>>,
}

impl ModelRouter {
    pub fn new(table: HashMap<PipelineRole, RoleConfig>, credentials: Credentials) -> Self {
        Self {
            table,
            default_config: RoleConfig::new(
                ProviderKind::Anthropic,
                "claude-sonnet-4-20250514",
                0.2,
            ),
            credentials,
            anthropic: OnceLock::new(),
            google: OnceLock::new(),
            github: OnceLock::new(),
        }
    }

    /// Build a router from the built-in role table plus config overrides,
    /// with credentials read from the environment.
    pub fn from_env(models: &ModelsConfig) -> Self {
        let mut table = default_role_table();
        apply_overrides(&mut table, models);
        Self::new(table, Credentials::from_env())
    }

    /// Pre-seed a transport, bypassing credential lookup. Used by embedding
    /// hosts and tests to inject mock providers.
    pub fn with_transport(self, kind: ProviderKind, provider: Arc<dyn ModelProvider>) -> Self {
        let cell = self.cell(kind);
        let _ = cell.set(provider);
        self
    }

    /// Resolve the configuration for a role. A role absent from the table
    /// falls back to the default configuration; the substitution is logged
    /// so a misconfigured role is visible rather than silent.
    pub fn resolve(&self, role: PipelineRole) -> RoleConfig {
        match self.table.get(&role) {
            Some(config) => config.clone(),
            None => {
                tracing::warn!(
                    role = role.as_str(),
                    model = %self.default_config.model,
                    "no model configured for role, substituting default"
                );
                self.default_config.clone()
            }
        }
    }

    fn cell(&self, kind: ProviderKind) -> &OnceLock<Arc<dyn ModelProvider>> {
        match kind {
            ProviderKind::Anthropic => &self.anthropic,
            ProviderKind::Google => &self.google,
            ProviderKind::GithubModels => &self.github,
        }
    }

    fn transport(&self, kind: ProviderKind) -> Result<Arc<dyn ModelProvider>, ForgeError> {
        let cell = self.cell(kind);
        if let Some(provider) = cell.get() {
            return Ok(provider.clone());
        }

        let key = self
            .credentials
            .get(kind)
            .ok_or_else(|| ForgeError::MissingCredential {
                provider: kind.as_str().into(),
                env_var: kind.env_var().into(),
            })?
            .to_string();

        let built: Arc<dyn ModelProvider> = match kind {
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(key)),
            ProviderKind::Google => Arc::new(GoogleProvider::new(key)),
            ProviderKind::GithubModels => Arc::new(GithubModelsProvider::new(key)),
        };

        // A concurrent caller may have won the race; either way the cell
        // holds exactly one shared transport from here on.
        Ok(cell.get_or_init(|| built).clone())
    }

    /// Route one model call. Returns the response text and normalized usage.
    pub async fn call(
        &self,
        role: PipelineRole,
        prompt: &str,
        system: &str,
        override_config: Option<&RoleConfig>,
    ) -> Result<(String, TokenUsage), ForgeError> {
        let config = match override_config {
            Some(c) => c.clone(),
            None => self.resolve(role),
        };

        tracing::debug!(
            role = role.as_str(),
            provider = config.provider.as_str(),
            model = %config.model,
            "dispatching model call"
        );

        let provider = self.transport(config.provider)?;
        let response = provider
            .chat(ChatRequest {
                model: config.model,
                messages: vec![Message::user(prompt)],
                max_tokens: Some(config.max_tokens),
                temperature: Some(config.temperature),
                system: Some(system.to_string()),
            })
            .await?;

        Ok((response.content, response.usage))
    }

    /// Embed a single text through the embedder role's provider.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ForgeError> {
        let config = self.resolve(PipelineRole::Embedder);
        let provider = self.transport(config.provider)?;
        let mut vectors = provider.embed(&[text]).await?;
        vectors.pop().ok_or_else(|| ForgeError::Provider {
            provider: config.provider.as_str().into(),
            message: "Embedding response was empty".into(),
            retriable: false,
        })
    }

    /// Model identity configured for a role, for report labeling.
    pub fn model_for(&self, role: PipelineRole) -> String {
        self.resolve(role).model
    }
}

fn apply_overrides(table: &mut HashMap<PipelineRole, RoleConfig>, models: &ModelsConfig) {
    let overrides = [
        (PipelineRole::SpecAuthor, &models.spec_author),
        (PipelineRole::EnvPlanner, &models.env_planner),
        (PipelineRole::Generator, &models.generator),
        (PipelineRole::ReviewerClaude, &models.reviewer_claude),
        (PipelineRole::ReviewerGemini, &models.reviewer_gemini),
        (PipelineRole::ReviewerGpt, &models.reviewer_gpt),
        (PipelineRole::Arbitrator, &models.arbitrator),
        (PipelineRole::Embedder, &models.embedder),
    ];

    for (role, value) in overrides {
        let Some(value) = value else { continue };
        let Some(model_ref) = ModelRef::parse(value) else {
            tracing::warn!(role = role.as_str(), value = %value, "invalid model override, expected provider/model");
            continue;
        };
        let Some(kind) = ProviderKind::from_tag(&model_ref.provider) else {
            tracing::warn!(role = role.as_str(), provider = %model_ref.provider, "unknown provider tag in model override");
            continue;
        };
        let temperature = table.get(&role).map(|c| c.temperature).unwrap_or(0.2);
        table.insert(role, RoleConfig::new(kind, model_ref.model, temperature));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_covers_all_roles() {
        let table = default_role_table();
        for role in [
            PipelineRole::SpecAuthor,
            PipelineRole::EnvPlanner,
            PipelineRole::Generator,
            PipelineRole::ReviewerClaude,
            PipelineRole::ReviewerGemini,
            PipelineRole::ReviewerGpt,
            PipelineRole::Arbitrator,
            PipelineRole::Embedder,
        ] {
            assert!(table.contains_key(&role), "missing {:?}", role);
        }
    }

    #[test]
    fn test_resolve_known_role() {
        let router = ModelRouter::new(default_role_table(), Credentials::default());
        let config = router.resolve(PipelineRole::ReviewerGemini);
        assert_eq!(config.provider, ProviderKind::Google);
        assert_eq!(config.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_resolve_missing_role_falls_back_to_default() {
        let router = ModelRouter::new(HashMap::new(), Credentials::default());
        let config = router.resolve(PipelineRole::Arbitrator);
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_apply_overrides_replaces_provider_and_model() {
        let mut table = default_role_table();
        let models = ModelsConfig {
            generator: Some("google/gemini-2.5-flash".into()),
            ..Default::default()
        };
        apply_overrides(&mut table, &models);

        let config = &table[&PipelineRole::Generator];
        assert_eq!(config.provider, ProviderKind::Google);
        assert_eq!(config.model, "gemini-2.5-flash");
        // temperature carried over from the default assignment
        assert!((config.temperature - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_apply_overrides_ignores_malformed_value() {
        let mut table = default_role_table();
        let models = ModelsConfig {
            arbitrator: Some("not-a-model-ref".into()),
            ..Default::default()
        };
        apply_overrides(&mut table, &models);
        assert_eq!(table[&PipelineRole::Arbitrator].model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn test_provider_kind_from_tag() {
        assert_eq!(ProviderKind::from_tag("anthropic"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::from_tag("github"), Some(ProviderKind::GithubModels));
        assert_eq!(ProviderKind::from_tag("azure"), None);
    }

    #[test]
    fn test_missing_credential_error() {
        let router = ModelRouter::new(default_role_table(), Credentials::default());
        let err = router.transport(ProviderKind::Anthropic).err().unwrap();
        assert!(matches!(err, ForgeError::MissingCredential { .. }));
    }
}
