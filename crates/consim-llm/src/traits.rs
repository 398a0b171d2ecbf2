use crate::error::GenError;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// A lazy, finite, non-restartable sequence of generated text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, GenError>> + Send>>;

/// Uniform interface over text-generation providers.
///
/// Implementations normalize provider-specific response shapes and errors
/// into plain text and the [`GenError`] taxonomy.
#[async_trait]
pub trait GenerationClient: Send + Sync + std::fmt::Debug {
    /// Whole-response generation.
    async fn generate(&self, prompt: &str) -> Result<String, GenError>;

    /// Incremental generation. Fragments arrive in generation order and can
    /// be forwarded to a consumer before the full response exists.
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream, GenError>;
}

/// Fixed prompt used by the connectivity self-test.
pub const SELF_TEST_PROMPT: &str = "Reply with the single word: ok";

/// Send a small fixed prompt and report the trimmed reply.
///
/// Failures carry the same taxonomy as a normal generation call. No
/// conversation state is involved.
pub async fn self_test(client: &dyn GenerationClient) -> Result<String, GenError> {
    let reply = client.generate(SELF_TEST_PROMPT).await?;
    let reply = reply.trim().to_string();
    if reply.is_empty() {
        return Err(GenError::Endpoint("provider returned an empty reply".to_string()));
    }
    Ok(reply)
}
