// Configuration layer for provider-agnostic client creation

use crate::error::GenError;
use crate::gemini::GeminiClient;
use crate::openai_compat::OpenAiCompatClient;
use crate::traits::GenerationClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Supported generation providers.
///
/// `SiliconFlow` and `Custom` both speak the OpenAI chat protocol; they
/// differ only in default base URL and model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
    SiliconFlow,
    Custom,
}

impl Provider {
    pub fn parse(tag: &str) -> Result<Self, GenError> {
        match tag.to_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            "siliconflow" => Ok(Provider::SiliconFlow),
            "custom" => Ok(Provider::Custom),
            other => Err(GenError::UnknownProvider(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::SiliconFlow => "siliconflow",
            Provider::Custom => "custom",
        }
    }

    /// Human-readable provider name for catalog listings.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Gemini => "Google Gemini",
            Provider::OpenAi => "OpenAI",
            Provider::SiliconFlow => "SiliconFlow",
            Provider::Custom => "Custom endpoint",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-flash",
            Provider::OpenAi => "gpt-3.5-turbo",
            Provider::SiliconFlow => "qwen/Qwen2.5-7B-Instruct",
            Provider::Custom => "gpt-3.5-turbo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::SiliconFlow => "https://api.siliconflow.cn/v1",
            Provider::Custom => "https://api.openai.com/v1",
        }
    }

    /// Configuration fields the provider needs beyond the API key.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Provider::Gemini => &["api_key"],
            Provider::OpenAi => &["api_key", "model"],
            Provider::SiliconFlow | Provider::Custom => &["api_key", "base_url", "model"],
        }
    }
}

/// Everything needed to construct a generation client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ProviderConfig {
    pub fn new(provider: Provider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            api_key: api_key.into(),
            base_url: None,
            model: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self::new(Provider::Gemini, api_key)
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new(Provider::OpenAi, api_key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Construct a [`GenerationClient`] from configuration.
///
/// Fails with `ClientInit` when the credential is absent.
pub fn build_client(config: &ProviderConfig) -> Result<Arc<dyn GenerationClient>, GenError> {
    if config.api_key.trim().is_empty() {
        return Err(GenError::ClientInit(format!(
            "no API key supplied for provider '{}'",
            config.provider.as_str()
        )));
    }

    match config.provider {
        Provider::Gemini => Ok(Arc::new(GeminiClient::new(config)?)),
        Provider::OpenAi | Provider::SiliconFlow | Provider::Custom => {
            Ok(Arc::new(OpenAiCompatClient::new(config)?))
        }
    }
}
