//! Ollama provider.
//!
//! Uses the non-streaming `/api/generate` endpoint; reachability is checked
//! with `/api/tags`.

use super::{
    factory::ProviderFactory,
    secrets::{ApiCredential, API_KEY_ENV},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
    DEFAULT_MODEL, DEFAULT_OLLAMA_URL,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;

/// Timeout for the reachability check.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Ollama HTTP provider.
pub struct OllamaProvider {
    base_url: String,
    credential: Option<ApiCredential>,
    client: reqwest::Client,
}

impl std::fmt::Debug for OllamaProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaProvider")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .finish()
    }
}

impl OllamaProvider {
    /// Create a provider for the given base URL (e.g. `http://localhost:11434`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential: None,
            client,
        })
    }

    /// Create from JSON configuration.
    ///
    /// Recognized keys: `base_url` (default `http://localhost:11434`) and
    /// `api_key` (falls back to `ATTESTOR_API_KEY`, optional).
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let base_url = config["base_url"].as_str().unwrap_or(DEFAULT_OLLAMA_URL);
        let mut provider = Self::new(base_url)?;
        provider.credential = ApiCredential::lookup(config, "api_key", API_KEY_ENV, "Ollama gateway token");
        Ok(provider)
    }

    /// Send a bearer token with every request.
    pub fn with_credential(mut self, credential: ApiCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.credential {
            // SECURITY: the only place the token is exposed
            Some(credential) => request.bearer_auth(credential.expose()),
            None => request,
        }
    }
}

/// `/api/generate` request body.
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

impl GenerateRequest {
    /// Fold chat messages into Ollama's system + prompt pair.
    fn from_messages(messages: Vec<ChatMessage>, config: &CompletionConfig) -> Self {
        let mut system: Vec<String> = Vec::new();
        let mut prompt: Vec<String> = Vec::new();
        for message in messages {
            if message.is_system() {
                system.push(message.content);
            } else {
                prompt.push(message.content);
            }
        }

        Self {
            model: config.model.clone(),
            prompt: prompt.join("\n\n"),
            system: if system.is_empty() {
                None
            } else {
                Some(system.join("\n\n"))
            },
            stream: false,
            options: GenerateOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
        }
    }
}

/// `/api/generate` response body (non-streaming).
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaError {
    error: String,
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let body = GenerateRequest::from_messages(messages, config);

        let response = self
            .authorize(self.client.post(format!("{}/api/generate", self.base_url)))
            .timeout(config.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(config.timeout)
                } else {
                    ProviderError::HttpError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<OllamaError>(&text)
                .map(|e| e.error)
                .unwrap_or(text);
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        Ok(CompletionResponse {
            content: body.response,
            usage: TokenUsage {
                prompt_tokens: body.prompt_eval_count,
                completion_tokens: body.eval_count,
            },
            model: if body.model.is_empty() {
                config.model.clone()
            } else {
                body.model
            },
        })
    }

    async fn health_check(&self) -> bool {
        let request = self
            .authorize(self.client.get(format!("{}/api/tags", self.base_url)))
            .timeout(HEALTH_TIMEOUT);

        match request.send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!(base_url = %self.base_url, error = %e, "Ollama unreachable");
                false
            }
        }
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Factory for creating Ollama providers from configuration.
///
/// ## Configuration Format
/// ```json
/// {
///   "base_url": "http://localhost:11434",   // Optional
///   "api_key": "..."                        // Optional, falls back to ATTESTOR_API_KEY
/// }
/// ```
pub struct OllamaProviderFactory;

impl ProviderFactory for OllamaProviderFactory {
    fn provider_type(&self) -> &'static str {
        "ollama"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.validate_config(config)?;
        Ok(Arc::new(OllamaProvider::from_config(config)?))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if let Some(url) = config["base_url"].as_str() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProviderError::NotConfigured(
                    "base_url must start with http:// or https://".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({
            "base_url": DEFAULT_OLLAMA_URL,
            "model": DEFAULT_MODEL,
        })
    }

    fn description(&self) -> &'static str {
        "Ollama local model server (/api/generate)"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::CredentialSource;

    #[test]
    fn test_request_folds_messages() {
        let config = CompletionConfig {
            model: "llama3.2".to_string(),
            max_tokens: 256,
            temperature: 0.0,
            timeout: Duration::from_secs(60),
        };
        let request = GenerateRequest::from_messages(
            vec![ChatMessage::system("Be strict."), ChatMessage::user("Rule: X")],
            &config,
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "llama3.2");
        assert_eq!(json["system"], "Be strict.");
        assert_eq!(json["prompt"], "Rule: X");
        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 256);
    }

    #[test]
    fn test_request_without_system_omits_field() {
        let request = GenerateRequest::from_messages(
            vec![ChatMessage::user("Rule: X")],
            &CompletionConfig::default(),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_response_parsing_tolerates_missing_counts() {
        let body: GenerateResponse =
            serde_json::from_str(r#"{"model": "llama3.2", "response": "{\"passed\": true}", "done": true}"#)
                .unwrap();
        assert_eq!(body.response, "{\"passed\": true}");
        assert_eq!(body.eval_count, 0);
    }

    #[test]
    fn test_from_config_trims_trailing_slash() {
        let config = serde_json::json!({ "base_url": "http://ollama.internal:11434/" });
        let provider = OllamaProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url(), "http://ollama.internal:11434");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_token_not_in_debug_output() {
        let secret = "gw-secret-token-12345";
        let provider = OllamaProvider::new(DEFAULT_OLLAMA_URL)
            .unwrap()
            .with_credential(ApiCredential::new(secret, CredentialSource::Programmatic, "Token"));

        let debug = format!("{:?}", provider);
        assert!(!debug.contains(secret), "Token was exposed in Debug output!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_factory_rejects_invalid_base_url() {
        let factory = OllamaProviderFactory;
        let config = serde_json::json!({ "base_url": "localhost:11434" });
        assert!(factory.validate_config(&config).is_err());
        assert!(factory.create(&config).is_err());
        assert_eq!(factory.default_config()["base_url"], DEFAULT_OLLAMA_URL);
    }

    #[tokio::test]
    async fn test_connection_refused_is_an_error() {
        let provider = OllamaProvider::new("http://127.0.0.1:9").unwrap();
        let config = CompletionConfig {
            timeout: Duration::from_secs(2),
            ..Default::default()
        };

        let result = provider.complete(vec![ChatMessage::user("x")], &config).await;
        assert!(matches!(
            result,
            Err(ProviderError::HttpError(_)) | Err(ProviderError::Timeout(_))
        ));
        assert!(!provider.health_check().await);
    }
}
