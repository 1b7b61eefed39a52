//! Provider factories and the registry that builds providers by name.
//!
//! ```ignore
//! let registry = ProviderRegistry::with_defaults();
//! let provider = registry.create("ollama", &serde_json::json!({"base_url": url}))?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::{LlmProvider, ProviderError};

/// Creates providers of one type from JSON configuration.
pub trait ProviderFactory: Send + Sync {
    /// Unique type name, e.g. "ollama".
    fn provider_type(&self) -> &'static str;

    /// Create a provider. `config` already has defaults merged in.
    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Validate configuration without creating a provider.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError>;

    /// Defaults for optional keys.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    /// Human-readable description.
    fn description(&self) -> &'static str {
        "Generative provider"
    }
}

/// Registry of provider factories keyed by type name.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every provider compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "ollama")]
        registry.register(Arc::new(super::OllamaProviderFactory));
        registry
    }

    /// Register a factory, replacing any previous one of the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    /// Create a provider. Keys missing from `config` take the factory's
    /// defaults.
    pub fn create(
        &self,
        provider_type: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self.factory(provider_type)?;
        let merged = merge_defaults(factory.default_config(), config);
        factory.validate_config(&merged)?;

        let provider = factory.create(&merged)?;
        tracing::debug!(provider = provider_type, "Provider created");
        Ok(provider)
    }

    /// Validate configuration for a provider type.
    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ProviderError> {
        let factory = self.factory(provider_type)?;
        factory.validate_config(&merge_defaults(factory.default_config(), config))
    }

    /// Registered type names, sorted.
    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    pub fn has_provider(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn ProviderFactory>, ProviderError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "Unknown provider type: '{}'. Available: {:?}",
                provider_type,
                self.available_types()
            ))
        })
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

/// Shallow merge: keys present (and non-null) in `config` win.
fn merge_defaults(defaults: JsonValue, config: &JsonValue) -> JsonValue {
    let mut merged = match defaults {
        JsonValue::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    if let JsonValue::Object(overrides) = config {
        for (key, value) in overrides {
            if !value.is_null() {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    JsonValue::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, CompletionConfig, CompletionResponse, TokenUsage};
    use async_trait::async_trait;

    struct EchoProvider {
        name: String,
    }

    #[async_trait]
    impl LlmProvider for EchoProvider {
        async fn complete(
            &self,
            messages: Vec<ChatMessage>,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            Ok(CompletionResponse {
                content: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
            })
        }

        async fn health_check(&self) -> bool {
            true
        }

        fn name(&self) -> &str {
            &self.name
        }
    }

    struct EchoFactory;

    impl ProviderFactory for EchoFactory {
        fn provider_type(&self) -> &'static str {
            "echo"
        }

        fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
            let name = config["name"].as_str().unwrap_or("unnamed").to_string();
            Ok(Arc::new(EchoProvider { name }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
            match config["name"].as_str() {
                Some(name) if !name.is_empty() => Ok(()),
                _ => Err(ProviderError::NotConfigured("name must not be empty".to_string())),
            }
        }

        fn default_config(&self) -> JsonValue {
            serde_json::json!({ "name": "echo-default" })
        }
    }

    #[test]
    fn test_create_merges_defaults() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        let provider = registry.create("echo", &serde_json::json!({})).unwrap();
        assert_eq!(provider.name(), "echo-default");

        let provider = registry
            .create("echo", &serde_json::json!({ "name": "custom" }))
            .unwrap();
        assert_eq!(provider.name(), "custom");
    }

    #[test]
    fn test_create_validates_merged_config() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        let result = registry.create("echo", &serde_json::json!({ "name": "" }));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
        assert!(registry.validate("echo", &serde_json::json!({})).is_ok());
    }

    #[test]
    fn test_unknown_provider_lists_available() {
        let mut registry = ProviderRegistry::new();
        registry.register(Arc::new(EchoFactory));

        match registry.create("openai", &serde_json::json!({})) {
            Err(ProviderError::NotConfigured(msg)) => {
                assert!(msg.contains("Unknown provider type"));
                assert!(msg.contains("echo"));
            }
            _ => panic!("Expected NotConfigured error"),
        }
        assert_eq!(registry.available_types(), vec!["echo"]);
    }

    #[test]
    fn test_null_overrides_keep_defaults() {
        let merged = merge_defaults(
            serde_json::json!({ "base_url": "http://a", "model": "m" }),
            &serde_json::json!({ "base_url": null, "model": "n" }),
        );
        assert_eq!(merged["base_url"], "http://a");
        assert_eq!(merged["model"], "n");
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn test_defaults_include_ollama() {
        assert!(ProviderRegistry::with_defaults().has_provider("ollama"));
    }
}
