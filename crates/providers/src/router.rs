//! Model router: resolves model references to the provider serving them.
//!
//! Model references are written `googleai/<model>` (or a bare model name,
//! which goes to the default provider).

use std::collections::HashMap;
use std::sync::Arc;

use flowdeck_core::error::ProviderError;
use flowdeck_core::provider::Provider;

use crate::gemini::GeminiProvider;

/// Routes model references to the correct provider.
#[derive(Clone)]
pub struct ModelRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
}

impl ModelRouter {
    /// Create a new router with a default provider name.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
        }
    }

    /// Register a provider under a prefix.
    pub fn register(&mut self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        self.providers.insert(name.into(), provider);
    }

    /// Get a specific provider by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }

    /// Resolve `prefix/model` or a bare model name to a provider and the
    /// model name that provider expects.
    pub fn resolve(&self, model_ref: &str) -> Result<(Arc<dyn Provider>, String), ProviderError> {
        let (prefix, model) = model_ref
            .split_once('/')
            .unwrap_or((self.default_provider.as_str(), model_ref));

        self.get(prefix)
            .map(|p| (p, model.to_string()))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "no provider registered for '{prefix}' (model '{model_ref}')"
                ))
            })
    }

    /// The provider used for bare model names.
    pub fn default_provider(&self) -> Result<Arc<dyn Provider>, ProviderError> {
        self.get(&self.default_provider).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "default provider '{}' is not registered",
                self.default_provider
            ))
        })
    }

    /// List all registered provider names, sorted.
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }
}

/// Build providers from configuration.
pub fn build_from_config(
    config: &flowdeck_config::AppConfig,
) -> Result<ModelRouter, ProviderError> {
    if !config.has_api_key() {
        tracing::warn!("No API key configured; model calls will fail until one is set");
    }

    let gemini = GeminiProvider::new(
        &config.api_base_url,
        config.api_key.clone(),
        config.flows.request_timeout_secs,
    )?;

    let mut router = ModelRouter::new(GeminiProvider::NAME);
    router.register(GeminiProvider::NAME, Arc::new(gemini));
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router() -> ModelRouter {
        build_from_config(&flowdeck_config::AppConfig::default()).unwrap()
    }

    #[test]
    fn resolves_prefixed_and_bare_models() {
        let router = router();
        let (provider, model) = router.resolve("googleai/gemini-2.5-flash").unwrap();
        assert_eq!(provider.name(), "googleai");
        assert_eq!(model, "gemini-2.5-flash");

        let (_, model) = router.resolve("gemini-2.5-pro").unwrap();
        assert_eq!(model, "gemini-2.5-pro");
    }

    #[test]
    fn unknown_prefix_is_not_configured() {
        let err = router().resolve("vertexai/gemini-2.5-flash").err().unwrap();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
    }

    #[test]
    fn build_from_default_config() {
        let router = router();
        assert_eq!(router.list(), vec!["googleai"]);
        assert!(router.default_provider().is_ok());
    }
}
