//! Provider router: builds the configured backends and picks one by name.

use kubrick_config::AppConfig;
use kubrick_core::provider::Provider;
use std::collections::HashMap;
use std::sync::Arc;

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::triton::{self, TritonProvider};

/// Routes requests to the correct provider.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get the default provider.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.providers.get(&self.default_provider).cloned()
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` entry is built, and the default provider is
/// built even when it has no entry of its own.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut router = ProviderRouter::new(&config.default_provider);

    let mut names: Vec<&str> = config.providers.keys().map(|s| s.as_str()).collect();
    if !config.providers.contains_key(&config.default_provider) {
        names.push(&config.default_provider);
    }

    for name in names {
        let entry = config.providers.get(name);
        let api_key = config.api_key_for(name).unwrap_or_default();
        let api_url = entry.and_then(|p| p.api_url.clone());
        let model = entry
            .and_then(|p| p.default_model.clone())
            .unwrap_or_else(|| config.default_model.clone());

        let provider: Arc<dyn Provider> = match name {
            "triton" => Arc::new(TritonProvider::new(
                api_url.as_deref().unwrap_or(triton::DEFAULT_URL),
                model,
            )),
            "anthropic" => {
                let p = AnthropicProvider::new(api_key, model);
                match api_url {
                    Some(url) => Arc::new(p.with_base_url(url)),
                    None => Arc::new(p),
                }
            }
            other => {
                let base_url = api_url.unwrap_or_else(|| default_base_url(other));
                Arc::new(OpenAiCompatProvider::new(other, base_url, api_key, model))
            }
        };

        router.register(name, provider);
    }

    router
}

/// Get the default base URL for well-known OpenAI-compatible providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubrick_config::ProviderConfig;

    #[test]
    fn router_register_and_lookup() {
        let mut router = ProviderRouter::new("openai");
        router.register("openai", Arc::new(OpenAiCompatProvider::openai("sk-test", "gpt-4o")));

        assert!(router.get("openai").is_some());
        assert!(router.get("nonexistent").is_none());
        assert!(router.default().is_some());
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openrouter").contains("openrouter.ai"));
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
    }

    #[test]
    fn build_from_default_config_uses_triton() {
        let config = AppConfig::default();
        let router = build_from_config(&config);
        let provider = router.default().unwrap();
        assert_eq!(provider.name(), "triton");
        assert_eq!(provider.model(), "llm_decoupled");
    }

    #[test]
    fn configured_providers_get_their_models() {
        let mut config = AppConfig {
            default_provider: "anthropic".into(),
            ..AppConfig::default()
        };
        config.providers.insert(
            "anthropic".into(),
            ProviderConfig {
                api_key: Some("sk-ant".into()),
                api_url: None,
                default_model: Some("claude-sonnet-4-5-20250929".into()),
            },
        );
        config.providers.insert("openai".into(), ProviderConfig::default());

        let router = build_from_config(&config);
        assert_eq!(router.list(), vec!["anthropic", "openai"]);
        assert_eq!(router.default().unwrap().model(), "claude-sonnet-4-5-20250929");
        assert_eq!(router.get("openai").unwrap().model(), config.default_model);
    }
}
