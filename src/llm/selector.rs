//! Maps a provider to its client configuration and builds model clients.

use std::sync::Arc;

use reqwest::Client;
use tracing::debug;

use super::client::ModelClient;
use super::gemini::GeminiProvider;
use super::openai::OpenAIProvider;
use crate::config::{ModelConfig, ProvidersConfig};
use crate::profile::ProviderKind;

/// Wire format family of a provider endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFamily {
    /// `POST /chat/completions` with SSE deltas.
    OpenAIChat,
    /// `POST /v1beta/models/{model}:streamGenerateContent?alt=sse`.
    GeminiGenerateContent,
}

/// How to construct the client for a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSpec {
    pub provider: ProviderKind,
    pub api_family: ApiFamily,
    /// Name of the per-session credential holding the API key.
    pub credential_key: &'static str,
    pub streaming: bool,
}

pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const GOOGLE_GEMINI_API_KEY: &str = "GOOGLE_GEMINI_API_KEY";

/// Select the client configuration for a provider.
pub fn select(provider: ProviderKind) -> ClientSpec {
    match provider {
        ProviderKind::OpenAI => ClientSpec {
            provider,
            api_family: ApiFamily::OpenAIChat,
            credential_key: OPENAI_API_KEY,
            streaming: true,
        },
        ProviderKind::Gemini => ClientSpec {
            provider,
            api_family: ApiFamily::GeminiGenerateContent,
            credential_key: GOOGLE_GEMINI_API_KEY,
            streaming: true,
        },
    }
}

/// Builds model clients from a spec and an API key.
pub trait ModelClientFactory: Send + Sync {
    fn build(&self, spec: &ClientSpec, api_key: String) -> ModelClient;
}

/// Builds HTTP-backed clients for the real provider endpoints.
#[derive(Clone)]
pub struct HttpClientFactory {
    client: Client,
    providers: ProvidersConfig,
}

impl HttpClientFactory {
    pub fn new(providers: ProvidersConfig) -> Self {
        Self {
            client: Client::new(),
            providers,
        }
    }

    fn model_config(&self, api_family: ApiFamily) -> &ModelConfig {
        match api_family {
            ApiFamily::OpenAIChat => &self.providers.openai,
            ApiFamily::GeminiGenerateContent => &self.providers.gemini,
        }
    }
}

impl ModelClientFactory for HttpClientFactory {
    fn build(&self, spec: &ClientSpec, api_key: String) -> ModelClient {
        let config = self.model_config(spec.api_family);
        debug!(
            provider = %spec.provider,
            base_url = %config.base_url,
            model = %config.model,
            "building model client"
        );

        let provider: Arc<dyn super::LLMProvider> = match spec.api_family {
            ApiFamily::OpenAIChat => Arc::new(OpenAIProvider::new(
                self.client.clone(),
                api_key,
                config.base_url.clone(),
            )),
            ApiFamily::GeminiGenerateContent => Arc::new(GeminiProvider::new(
                self.client.clone(),
                api_key,
                config.base_url.clone(),
            )),
        };

        ModelClient::new(provider, config.model.clone())
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_routes_to_openai_key() {
        let spec = select(ProviderKind::OpenAI);
        assert_eq!(spec.credential_key, "OPENAI_API_KEY");
        assert_eq!(spec.api_family, ApiFamily::OpenAIChat);
        assert!(spec.streaming);
    }

    #[test]
    fn test_gemini_routes_to_gemini_key() {
        let spec = select(ProviderKind::Gemini);
        assert_eq!(spec.credential_key, "GOOGLE_GEMINI_API_KEY");
        assert_eq!(spec.api_family, ApiFamily::GeminiGenerateContent);
        assert!(spec.streaming);
    }

    #[test]
    fn test_http_factory_uses_configured_model() {
        let mut providers = ProvidersConfig::default();
        providers.gemini.model = "gemini-1.5-pro".to_string();
        let factory = HttpClientFactory::new(providers);

        let client = factory.build(&select(ProviderKind::Gemini), "key".to_string());
        assert_eq!(client.model(), "gemini-1.5-pro");

        let client = factory.build(&select(ProviderKind::OpenAI), "key".to_string());
        assert_eq!(client.model(), "gpt-3.5-turbo");
    }
}
