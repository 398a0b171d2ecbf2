use async_trait::async_trait;
use consim_llm::{self_test, GenError, GenerationClient, TextStream};
use futures::StreamExt;

#[derive(Debug)]
struct CannedClient {
    reply: String,
}

#[async_trait]
impl GenerationClient for CannedClient {
    async fn generate(&self, _prompt: &str) -> Result<String, GenError> {
        Ok(self.reply.clone())
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, GenError> {
        let fragments: Vec<Result<String, GenError>> = self
            .reply
            .split_inclusive(' ')
            .map(|s| Ok(s.to_string()))
            .collect();
        Ok(Box::pin(futures::stream::iter(fragments)))
    }
}

#[derive(Debug)]
struct FailingClient;

#[async_trait]
impl GenerationClient for FailingClient {
    async fn generate(&self, _prompt: &str) -> Result<String, GenError> {
        Err(GenError::Auth("401 unauthorized".to_string()))
    }

    async fn generate_stream(&self, _prompt: &str) -> Result<TextStream, GenError> {
        Err(GenError::Auth("401 unauthorized".to_string()))
    }
}

#[tokio::test]
async fn self_test_reports_trimmed_reply() {
    let client = CannedClient {
        reply: "  ok  ".to_string(),
    };
    let reply = self_test(&client).await.unwrap();
    assert_eq!(reply, "ok");
}

#[tokio::test]
async fn self_test_rejects_empty_reply() {
    let client = CannedClient {
        reply: "   ".to_string(),
    };
    let err = self_test(&client).await.unwrap_err();
    assert!(matches!(err, GenError::Endpoint(_)));
}

#[tokio::test]
async fn self_test_surfaces_auth_errors() {
    let err = self_test(&FailingClient).await.unwrap_err();
    assert!(matches!(err, GenError::Auth(_)));
    assert!(err.need_api_key());
}

#[tokio::test]
async fn stream_fragments_arrive_in_order() {
    let client = CannedClient {
        reply: "one two three".to_string(),
    };
    let mut stream = client.generate_stream("prompt").await.unwrap();

    let mut assembled = String::new();
    while let Some(fragment) = stream.next().await {
        assembled.push_str(&fragment.unwrap());
    }
    assert_eq!(assembled, "one two three");
}
