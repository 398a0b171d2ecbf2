use axum::extract::{Extension, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use consim_llm::{build_client, self_test, Provider, ProviderConfig};

use crate::error::{ApiError, ApiResult};
use crate::session::SessionId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ApiKeyRequest {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl ApiKeyRequest {
    fn into_provider_config(self, state: &AppState) -> Result<ProviderConfig, ApiError> {
        if self.api_key.trim().is_empty() {
            return Err(ApiError::BadRequest("api_key must not be empty".to_string()));
        }

        let tag = self
            .provider
            .unwrap_or_else(|| state.config.generation.provider.clone());
        let provider = Provider::parse(&tag)
            .map_err(|_| ApiError::BadRequest(format!("unknown provider: {}", tag)))?;

        let mut config = ProviderConfig::new(provider, self.api_key)
            .with_timeout(Duration::from_secs(state.config.generation.timeout_secs));
        if let Some(base_url) = self.base_url.filter(|s| !s.trim().is_empty()) {
            config = config.with_base_url(base_url);
        }
        if let Some(model) = self.model.filter(|s| !s.trim().is_empty()) {
            config = config.with_model(model);
        }
        Ok(config)
    }
}

/// Probe a candidate key with a one-word round trip. Nothing is stored;
/// the verdict distinguishes bad keys from unreachable endpoints.
pub async fn test_api_key(
    State(state): State<AppState>,
    Json(req): Json<ApiKeyRequest>,
) -> ApiResult<Json<Value>> {
    let provider_config = req.into_provider_config(&state)?;
    let provider = provider_config.provider;

    let verdict = match build_client(&provider_config) {
        Ok(client) => match self_test(client.as_ref()).await {
            Ok(_) => json!({
                "success": true,
                "message": format!("{} key verified", provider.display_name()),
            }),
            Err(e) => json!({
                "success": false,
                "message": e.to_string(),
                "need_api_key": e.need_api_key(),
            }),
        },
        Err(e) => json!({
            "success": false,
            "message": e.to_string(),
            "need_api_key": e.need_api_key(),
        }),
    };

    Ok(Json(verdict))
}

/// Store a per-session provider override; later generation calls in this
/// session use it instead of the server default.
pub async fn set_api_key(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
    Json(req): Json<ApiKeyRequest>,
) -> ApiResult<Json<Value>> {
    let provider_config = req.into_provider_config(&state)?;
    let provider = provider_config.provider;

    // Fail fast on configurations that can never produce a client.
    build_client(&provider_config)?;
    state.set_provider_override(&session_id, provider_config).await;

    Ok(Json(json!({
        "success": true,
        "provider": provider.as_str(),
    })))
}

pub async fn get_api_providers(
    State(state): State<AppState>,
    Extension(SessionId(session_id)): Extension<SessionId>,
) -> Json<Value> {
    let catalog: Vec<Value> = [
        Provider::Gemini,
        Provider::OpenAi,
        Provider::SiliconFlow,
        Provider::Custom,
    ]
    .iter()
    .map(|provider| {
        json!({
            "id": provider.as_str(),
            "name": provider.display_name(),
            "default_model": provider.default_model(),
            "requires": provider.required_fields(),
        })
    })
    .collect();

    let current = state.provider_for(&session_id).await;
    Json(json!({
        "providers": catalog,
        "current": current.as_str(),
    }))
}
