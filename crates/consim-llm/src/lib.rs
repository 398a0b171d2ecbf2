pub mod config;
pub mod error;
pub mod gemini;
pub mod openai_compat;
pub mod streaming;
pub mod traits;

pub use config::{build_client, Provider, ProviderConfig, DEFAULT_TIMEOUT_SECS};
pub use error::{classify_provider_error, classify_transport_error, GenError};
pub use gemini::GeminiClient;
pub use openai_compat::OpenAiCompatClient;
pub use traits::{self_test, GenerationClient, TextStream, SELF_TEST_PROMPT};
