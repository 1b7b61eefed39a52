//! Secure credential handling for providers.
//!
//! A local Ollama needs no credential, but gateways in front of one often
//! require a bearer token. Tokens are held in [`ApiCredential`]:
//!
//! - Debug/Display print `[REDACTED]`, never the value
//! - The value is zeroed on drop (`secrecy`)
//! - Callers must call `.expose()` at the point of use
//!
//! ```ignore
//! let token = ApiCredential::lookup(&config, "api_key", API_KEY_ENV, "Gateway token");
//! if let Some(token) = &token {
//!     request = request.bearer_auth(token.expose());
//! }
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

/// Environment variable holding the optional gateway token.
pub const API_KEY_ENV: &str = "ATTESTOR_API_KEY";

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Provider configuration (JSON/YAML)
    Config,
    /// Environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a credential value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Look up an optional credential: `config[config_key]` first, then
    /// the `env_var` environment variable. Blank values count as absent.
    pub fn lookup(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Option<Self> {
        if let Some(value) = config[config_key].as_str().filter(|v| !v.trim().is_empty()) {
            return Some(Self::new(value, CredentialSource::Config, name));
        }

        std::env::var(env_var)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self::new(v, CredentialSource::Environment, name))
    }

    /// Expose the value for use in a request header.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted() {
        let secret = "gw-super-secret-token-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Gateway token");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("Gateway token from programmatic"));

        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn test_lookup_prefers_config() {
        std::env::set_var("ATTESTOR_TEST_TOKEN_PRIORITY", "env-token");
        let config = serde_json::json!({ "api_key": "config-token" });

        let cred = ApiCredential::lookup(&config, "api_key", "ATTESTOR_TEST_TOKEN_PRIORITY", "Token")
            .unwrap();
        assert_eq!(cred.expose(), "config-token");
        assert_eq!(cred.source(), CredentialSource::Config);

        std::env::remove_var("ATTESTOR_TEST_TOKEN_PRIORITY");
    }

    #[test]
    fn test_lookup_falls_back_to_env() {
        std::env::set_var("ATTESTOR_TEST_TOKEN_FALLBACK", "env-token");
        let config = serde_json::json!({ "api_key": "  " });

        let cred = ApiCredential::lookup(&config, "api_key", "ATTESTOR_TEST_TOKEN_FALLBACK", "Token")
            .unwrap();
        assert_eq!(cred.expose(), "env-token");
        assert_eq!(cred.source(), CredentialSource::Environment);

        std::env::remove_var("ATTESTOR_TEST_TOKEN_FALLBACK");
    }

    #[test]
    fn test_lookup_absent() {
        let config = serde_json::json!({});
        assert!(ApiCredential::lookup(&config, "api_key", "ATTESTOR_TEST_TOKEN_UNSET_9431", "Token").is_none());
    }
}
