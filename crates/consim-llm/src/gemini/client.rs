// Gemini-specific client implementation (HTTP direct, no SDK)

use crate::config::ProviderConfig;
use crate::error::{classify_provider_error, classify_transport_error, GenError};
use crate::streaming::parse_gemini_sse_stream;
use crate::traits::{GenerationClient, TextStream};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Google Gemini client.
///
/// Authentication goes through the `x-goog-api-key` header; the model name
/// is part of the URL path, and streaming uses the `alt=sse` variant of the
/// same endpoint.
#[derive(Debug)]
pub struct GeminiClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_ms: u64,
}

impl GeminiClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, GenError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|_| GenError::ClientInit("API key contains invalid characters".to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(|e| GenError::ClientInit(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            model: config.model().to_string(),
            timeout_ms: config.timeout().as_millis() as u64,
        })
    }

    fn request_body(prompt: &str) -> serde_json::Value {
        json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        })
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/v1beta/models/{}:{}", self.base_url, self.model, method)
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenError> {
        let response = self
            .http_client
            .post(self.endpoint("generateContent"))
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_provider_error(Some(status.as_u16()), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout_ms))?;

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|_| classify_provider_error(Some(status.as_u16()), &body))?;

        parsed
            .text()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GenError::Endpoint("provider returned an empty reply".to_string()))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, GenError> {
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self
            .http_client
            .post(url)
            .json(&Self::request_body(prompt))
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_provider_error(Some(status.as_u16()), &body));
        }

        Ok(parse_gemini_sse_stream(response))
    }
}

// ============================================================================
// GEMINI RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(rename = "finishReason", default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any.
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let joined: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if joined.is_empty() {
            None
        } else {
            Some(joined)
        }
    }
}
