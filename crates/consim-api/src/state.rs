use crate::config::{api_key_env, Config};
use crate::error::ApiError;
use consim_dialogue::DialogueController;
use consim_llm::{build_client, GenError, GenerationClient, Provider, ProviderConfig};
use std::sync::Arc;

/// Shared application state passed to all handlers
///
/// All resources are wrapped in Arc for efficient sharing across async
/// tasks. The dialogue graph inside the controller is immutable after
/// startup; all mutable state lives in the controller's session store.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub controller: Arc<DialogueController>,
}

impl AppState {
    pub fn new(config: Config, controller: DialogueController) -> Self {
        Self {
            config: Arc::new(config),
            controller: Arc::new(controller),
        }
    }

    /// Resolve the generation client for a session: its stored override if
    /// one was set, otherwise the server's default provider. Clients are
    /// cheap to build (a reqwest client plus headers), so they are built
    /// per request rather than pooled.
    pub async fn client_for(&self, session_id: &str) -> Result<Arc<dyn GenerationClient>, ApiError> {
        if let Some(entry) = self.controller.sessions().get(session_id).await {
            let data = entry.lock().await;
            if let Some(override_config) = &data.provider_override {
                return Ok(build_client(override_config)?);
            }
        }

        let provider_config = self.config.default_provider().ok_or_else(|| {
            let provider = Provider::parse(&self.config.generation.provider)
                .map(|p| api_key_env(p))
                .unwrap_or("the provider API key variable");
            ApiError::Generation(GenError::ClientInit(format!(
                "no API key configured; set {} or supply one via /set_api_key",
                provider
            )))
        })?;
        Ok(build_client(&provider_config)?)
    }

    /// The provider currently in effect for a session, for catalog listings.
    pub async fn provider_for(&self, session_id: &str) -> Provider {
        if let Some(entry) = self.controller.sessions().get(session_id).await {
            let data = entry.lock().await;
            if let Some(override_config) = &data.provider_override {
                return override_config.provider;
            }
        }
        Provider::parse(&self.config.generation.provider).unwrap_or(Provider::Gemini)
    }

    /// Store a per-session provider override.
    pub async fn set_provider_override(&self, session_id: &str, config: ProviderConfig) {
        let entry = self.controller.sessions().entry(session_id).await;
        let mut data = entry.lock().await;
        data.provider_override = Some(config);
    }
}
