//! OpenAI-compatible HTTP client: streaming chat completions and embeddings.
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{ChatMessage, Embedder};
use crate::config::Config;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<ChatDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}

pub struct OpenAIClient {
    base_url: String,
    api_key: Option<String>,
    chat_model: String,
    embedding_model: String,
    dimensions: usize,
    http_client: reqwest::Client,
}

impl OpenAIClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            base_url: config.openai_base_url.clone(),
            api_key: config.openai_api_key.clone(),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            dimensions: config.embedding_dimensions,
            http_client,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not configured"))
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.base_url)
    }

    /// Starts a streaming completion and yields the text deltas as they
    /// arrive. Errors before the first byte are returned directly.
    pub async fn stream_chat(
        &self,
        messages: &[ChatMessage],
    ) -> anyhow::Result<BoxStream<'static, anyhow::Result<String>>> {
        debug!("Starting streaming completion with {} messages", messages.len());
        let request = ChatCompletionRequest {
            model: &self.chat_model,
            messages,
            stream: true,
        };
        let response = self.http_client
            .post(self.completions_url())
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Chat completion request failed: {}", e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Chat completion returned {}: {}", status, body));
        }

        let byte_stream = response.bytes_stream();
        let deltas = async_stream::try_stream! {
            let mut buffer: Vec<u8> = Vec::new();
            futures_util::pin_mut!(byte_stream);
            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = chunk_result
                    .map_err(|e| anyhow::anyhow!("Stream read error: {}", e))?;
                buffer.extend_from_slice(&chunk);
                while let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line_bytes: Vec<u8> = buffer.drain(..=newline_pos).collect();
                    let line = String::from_utf8_lossy(&line_bytes);
                    match parse_sse_line(line.trim()) {
                        SseLine::Skip => continue,
                        SseLine::Done => return,
                        SseLine::Delta { content, finished } => {
                            if let Some(content) = content {
                                yield content;
                            }
                            if finished {
                                return;
                            }
                        }
                    }
                }
            }
        };
        Ok(deltas.boxed())
    }

    pub async fn create_embeddings(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Requesting embeddings for {} text(s)", texts.len());
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: texts,
            dimensions: self.dimensions,
        };
        let response = self.http_client
            .post(self.embeddings_url())
            .bearer_auth(self.api_key()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Embedding request failed: {}", e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Embedding endpoint returned {}: {}", status, body));
        }
        let mut embedding_response: EmbeddingResponse = response.json().await
            .map_err(|e| anyhow::anyhow!("Failed to parse embedding response: {}", e))?;
        if embedding_response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Embedding endpoint returned {} vectors for {} inputs",
                embedding_response.data.len(),
                texts.len()
            ));
        }
        embedding_response.data.sort_by_key(|d| d.index);
        Ok(embedding_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIClient {
    async fn embed(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.create_embeddings(texts).await
    }
}

#[derive(Debug, PartialEq)]
enum SseLine {
    Skip,
    Done,
    Delta { content: Option<String>, finished: bool },
}

fn parse_sse_line(line: &str) -> SseLine {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => {
            let finished = chunk.choices.iter().any(|c| c.finish_reason.is_some());
            let content: String = chunk
                .choices
                .into_iter()
                .filter_map(|c| c.delta.and_then(|d| d.content))
                .collect();
            SseLine::Delta {
                content: (!content.is_empty()).then_some(content),
                finished,
            }
        }
        Err(e) => {
            debug!("Ignoring unparseable stream line: {}", e);
            SseLine::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;

    fn client_for(server: &mockito::ServerGuard) -> OpenAIClient {
        let mut config = test_config();
        config.openai_base_url = server.url();
        OpenAIClient::from_config(&config).unwrap()
    }

    #[test]
    fn test_parse_sse_lines() {
        assert_eq!(parse_sse_line(""), SseLine::Skip);
        assert_eq!(parse_sse_line(": keep-alive"), SseLine::Skip);
        assert_eq!(parse_sse_line("data: [DONE]"), SseLine::Done);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hej"},"finish_reason":null}]}"#),
            SseLine::Delta { content: Some("Hej".to_string()), finished: false }
        );
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            SseLine::Delta { content: None, finished: true }
        );
    }

    #[tokio::test]
    async fn test_stream_chat_yields_deltas() {
        let mut server = mockito::Server::new_async().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Register \"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"with SKAT.\"},\"finish_reason\":null}]}\n\n",
            "data: [DONE]\n\n",
        );
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = client_for(&server);
        let messages = vec![ChatMessage::user("How do I pay tax?")];
        let stream = client.stream_chat(&messages).await.unwrap();
        let parts: Vec<String> = stream.map(|r| r.unwrap()).collect().await;

        assert_eq!(parts.concat(), "Register with SKAT.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_stream_chat_surfaces_http_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = client_for(&server);
        let result = client.stream_chat(&[ChatMessage::user("hi")]).await;
        let err = result.err().unwrap();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_embeddings_are_returned_in_input_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/embeddings")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "text-embedding-3-small",
                "dimensions": 4
            })))
            .with_status(200)
            .with_body(r#"{"data":[
                {"index":1,"embedding":[0.0,1.0,0.0,0.0]},
                {"index":0,"embedding":[1.0,0.0,0.0,0.0]}
            ]}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let vectors = client
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors[0], vec![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let mut config = test_config();
        config.openai_api_key = None;
        let client = OpenAIClient::from_config(&config).unwrap();

        assert!(!client.is_configured());
        let err = client.embed(&["x".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
