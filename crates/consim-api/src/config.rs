use config::{Config as ConfigLoader, ConfigError, Environment, File};
use consim_llm::{Provider, ProviderConfig};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub generation: GenerationConfig,
    pub dialogue: DialogueConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

/// Default generation provider. The API key is never configured in TOML;
/// it is looked up from the provider-specific environment variable.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct DialogueConfig {
    pub graph_path: String,
    pub start_node: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (with SERVER_, GENERATION_, etc. prefixes)
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(
                Environment::default()
                    .prefix("SERVER")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("CORS")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("GENERATION")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("DIALOGUE")
                    .separator("_")
                    .try_parsing(true),
            )
            .add_source(
                Environment::default()
                    .prefix("LOG")
                    .separator("_")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));
        builder.build()?.try_deserialize()
    }

    /// Resolve the default [`ProviderConfig`], reading the API key from the
    /// provider's environment variable. `None` when no key is set: the
    /// server starts anyway and clients are built lazily per request.
    pub fn default_provider(&self) -> Option<ProviderConfig> {
        let provider = Provider::parse(&self.generation.provider).ok()?;
        let api_key = std::env::var(api_key_env(provider)).ok()?;
        if api_key.trim().is_empty() {
            return None;
        }

        let mut config = ProviderConfig::new(provider, api_key)
            .with_timeout(Duration::from_secs(self.generation.timeout_secs));
        if let Some(model) = &self.generation.model {
            config = config.with_model(model);
        }
        if let Some(base_url) = &self.generation.base_url {
            config = config.with_base_url(base_url);
        }
        Some(config)
    }
}

/// Environment variable holding the API key for a provider.
pub fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Gemini => "GEMINI_API_KEY",
        Provider::OpenAi => "OPENAI_API_KEY",
        Provider::SiliconFlow => "SILICONFLOW_API_KEY",
        Provider::Custom => "CUSTOM_API_KEY",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_structure() {
        let toml = r#"
            [server]
            host = "127.0.0.1"
            port = 5000

            [cors]
            enabled = true
            origins = ["http://localhost:3000"]

            [generation]
            provider = "gemini"
            timeout_secs = 30

            [dialogue]
            graph_path = "data/dialogue_graph.json"
            start_node = "M1-01"

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.generation.provider, "gemini");
        assert_eq!(config.dialogue.start_node, "M1-01");
    }

    #[test]
    fn test_api_key_env_names() {
        assert_eq!(api_key_env(Provider::Gemini), "GEMINI_API_KEY");
        assert_eq!(api_key_env(Provider::SiliconFlow), "SILICONFLOW_API_KEY");
    }
}
