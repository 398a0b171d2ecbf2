// OpenAI-compatible chat client (HTTP direct, no SDK)
//
// Covers the OpenAI API itself plus any endpoint speaking the same chat
// protocol (SiliconFlow, self-hosted gateways); only base URL and model
// differ between them.

use crate::config::ProviderConfig;
use crate::error::{classify_provider_error, classify_transport_error, GenError};
use crate::streaming::parse_openai_sse_stream;
use crate::traits::{GenerationClient, TextStream};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2000;

#[derive(Debug)]
pub struct OpenAiCompatClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_ms: u64,
}

impl OpenAiCompatClient {
    pub fn new(config: &ProviderConfig) -> Result<Self, GenError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.trim()))
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

    fn request_body(&self, prompt: &str, stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": TEMPERATURE,
            "max_tokens": MAX_TOKENS,
            "stream": stream,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl GenerationClient for OpenAiCompatClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenError> {
        let response = self
            .http_client
            .post(self.completions_url())
            .json(&self.request_body(prompt, false))
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

        // A success status with a non-JSON body is the misconfigured-proxy
        // case; run it through the same classification as error bodies.
        let parsed: ChatCompletionResponse = serde_json::from_str(&body)
            .map_err(|_| classify_provider_error(Some(status.as_u16()), &body))?;

        parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| GenError::Endpoint("provider returned an empty reply".to_string()))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, GenError> {
        let response = self
            .http_client
            .post(self.completions_url())
            .json(&self.request_body(prompt, true))
            .send()
            .await
            .map_err(|e| classify_transport_error(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_provider_error(Some(status.as_u16()), &body));
        }

        Ok(parse_openai_sse_stream(response))
    }
}

// ============================================================================
// CHAT COMPLETIONS RESPONSE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ResponseMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Provider, ProviderConfig};

    #[test]
    fn completion_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"fine"},"finish_reason":"stop"}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("fine")
        );
    }

    #[test]
    fn request_body_shape() {
        let config = ProviderConfig::new(Provider::Custom, "sk-test")
            .with_base_url("http://localhost:9000/v1")
            .with_model("local-7b");
        let client = OpenAiCompatClient::new(&config).unwrap();
        let body = client.request_body("hello", true);

        assert_eq!(body["model"], "local-7b");
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(client.completions_url(), "http://localhost:9000/v1/chat/completions");
    }
}
