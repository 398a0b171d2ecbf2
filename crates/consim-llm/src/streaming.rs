use crate::error::GenError;
use crate::gemini::GenerateContentResponse;
use crate::traits::TextStream;
use futures::StreamExt;
use reqwest::Response;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChoice {
    pub delta: Delta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatStreamChunk {
    pub fn content(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.delta.content.as_deref())
    }

    pub fn is_done(&self) -> bool {
        self.choices
            .first()
            .and_then(|c| c.finish_reason.as_ref())
            .is_some()
    }
}

/// Parse an OpenAI-compatible SSE body into a stream of text fragments.
///
/// Lines are assembled from raw byte chunks through a `VecDeque` buffer so a
/// `data:` record split across network reads is handled correctly. The
/// `[DONE]` sentinel ends the stream.
pub fn parse_openai_sse_stream(response: Response) -> TextStream {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = VecDeque::with_capacity(8192);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes);

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        if let Ok(line_str) = std::str::from_utf8(&line_bytes) {
                            let line = line_str.trim();

                            if line.is_empty() {
                                continue;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                if data == "[DONE]" {
                                    return;
                                }

                                match serde_json::from_str::<ChatStreamChunk>(data) {
                                    Ok(chunk) => {
                                        if let Some(content) = chunk.content() {
                                            if !content.is_empty() {
                                                yield Ok(content.to_string());
                                            }
                                        }
                                        if chunk.is_done() {
                                            return;
                                        }
                                    }
                                    Err(e) => yield Err(GenError::Endpoint(
                                        format!("failed to parse stream chunk: {}", e),
                                    )),
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(GenError::Upstream(format!("stream error: {}", e)));
                    return;
                }
            }
        }
    })
}

/// Parse a Gemini `streamGenerateContent?alt=sse` body into text fragments.
///
/// Each `data:` record is a full `GenerateContentResponse` carrying one
/// incremental candidate; the stream simply ends when the body does.
pub fn parse_gemini_sse_stream(response: Response) -> TextStream {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = VecDeque::with_capacity(8192);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(bytes);

                    while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                        let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();

                        if let Ok(line_str) = std::str::from_utf8(&line_bytes) {
                            let line = line_str.trim();

                            if line.is_empty() {
                                continue;
                            }

                            if let Some(data) = line.strip_prefix("data: ") {
                                match serde_json::from_str::<GenerateContentResponse>(data) {
                                    Ok(chunk) => {
                                        if let Some(text) = chunk.text() {
                                            if !text.is_empty() {
                                                yield Ok(text);
                                            }
                                        }
                                    }
                                    Err(e) => yield Err(GenError::Endpoint(
                                        format!("failed to parse stream chunk: {}", e),
                                    )),
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    yield Err(GenError::Upstream(format!("stream error: {}", e)));
                    return;
                }
            }
        }
    })
}
