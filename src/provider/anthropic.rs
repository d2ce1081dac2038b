//! Adapter for the [Anthropic Messages API](https://docs.anthropic.com/en/api/messages).

use crate::error::{GatewayError, Result};
use crate::provider::remote_common::{SseBuffer, check_http_status};
use crate::traits::{ChunkStream, GenerationChunk, GenerationConfig, LlmProvider};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const SUPPORTED_MODELS: &[&str] = &["claude-sonnet-4-5-20250929", "claude-opus-4-6"];

/// Hosted chat backend speaking the Anthropic Messages protocol.
///
/// The system prompt goes in the top-level `system` field, never merged into
/// the user message. Streaming responses arrive as SSE events; the terminal
/// sentinel is synthesized after the event stream ends.
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    url: String,
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, MESSAGES_URL)
    }

    /// Point the adapter at an alternative messages endpoint (proxies,
    /// tests).
    pub fn with_endpoint(api_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            url: url.into(),
        }
    }

    fn request(&self, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
    }
}

/// Build a Messages API payload from a prompt and generation config.
fn build_messages_payload(
    prompt: &str,
    config: &GenerationConfig,
    stream: bool,
) -> serde_json::Value {
    let model = if config.model.is_empty() {
        DEFAULT_MODEL
    } else {
        config.model.as_str()
    };

    let mut body = json!({
        "model": model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "messages": [{ "role": "user", "content": prompt }],
    });
    if !config.system_prompt.is_empty() {
        body["system"] = json!(config.system_prompt);
    }
    if stream {
        body["stream"] = json!(true);
    }
    body
}

/// Pull the text of the first content block out of a non-streaming response.
///
/// A 2xx response without a text content block is malformed and fails the
/// call instead of collapsing to empty output.
fn extract_message_text(body: &serde_json::Value) -> Result<String> {
    body.get("content")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|item| item.get("text"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string())
        .ok_or_else(|| {
            GatewayError::Backend("Anthropic response missing content".to_string())
        })
}

/// Extract the incremental text fragment from one SSE event, if any.
///
/// Only `content_block_delta` events with a `text_delta` carry text; message
/// lifecycle events (`message_start`, `message_stop`, pings) yield nothing.
fn parse_event(data: &str) -> Result<Option<String>> {
    let event: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| GatewayError::Parse(format!("Anthropic event: {e}: {data}")))?;

    if event.get("type").and_then(|t| t.as_str()) != Some("content_block_delta") {
        return Ok(None);
    }
    Ok(event
        .get("delta")
        .and_then(|d| d.get("text"))
        .and_then(|t| t.as_str())
        .map(|t| t.to_string()))
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let body = build_messages_payload(prompt, config, false);

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("Anthropic request failed: {e}")))?;

        let body: serde_json::Value = check_http_status("Anthropic", response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Backend(format!("Anthropic response: {e}")))?;

        extract_message_text(&body)
    }

    fn generate_stream(&self, prompt: &str, config: &GenerationConfig) -> ChunkStream {
        let request = self.request(&build_messages_payload(prompt, config, true));

        Box::pin(try_stream! {
            let response = request
                .send()
                .await
                .map_err(|e| GatewayError::Transport(format!("Anthropic request failed: {e}")))?;
            let response = check_http_status("Anthropic", response).await?;

            let mut sse = SseBuffer::default();
            let mut bytes = response.bytes_stream();
            while let Some(next) = bytes.next().await {
                let chunk = next
                    .map_err(|e| GatewayError::Transport(format!("Anthropic stream failed: {e}")))?;
                for data in sse.push(&chunk) {
                    if let Some(text) = parse_event(&data)? {
                        yield GenerationChunk::text(text);
                    }
                }
            }
            for data in sse.drain() {
                if let Some(text) = parse_event(&data)? {
                    yield GenerationChunk::text(text);
                }
            }

            // The Messages stream ends without an explicit terminal chunk.
            yield GenerationChunk::sentinel();
        })
    }

    fn supported_models(&self) -> &[&str] {
        SUPPORTED_MODELS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_uses_default_model_when_empty() {
        let payload = build_messages_payload("hi", &GenerationConfig::default(), false);
        assert_eq!(payload["model"], DEFAULT_MODEL);
        assert_eq!(payload["max_tokens"], 2048);
        assert!(payload.get("system").is_none());
        assert!(payload.get("stream").is_none());
    }

    #[test]
    fn payload_carries_system_prompt_as_distinct_field() {
        let config = GenerationConfig {
            model: "claude-opus-4-6".into(),
            system_prompt: "be terse".into(),
            ..Default::default()
        };
        let payload = build_messages_payload("hi", &config, true);
        assert_eq!(payload["model"], "claude-opus-4-6");
        assert_eq!(payload["system"], "be terse");
        assert_eq!(payload["stream"], true);
        assert_eq!(payload["messages"][0]["role"], "user");
        assert_eq!(payload["messages"][0]["content"], "hi");
    }

    #[test]
    fn message_text_is_extracted_from_the_first_content_block() {
        let body: serde_json::Value = serde_json::from_str(
            r#"{"content":[{"type":"text","text":"Hello"}],"stop_reason":"end_turn"}"#,
        )
        .unwrap();
        assert_eq!(extract_message_text(&body).unwrap(), "Hello");
    }

    #[test]
    fn response_without_content_is_a_backend_error() {
        for raw in [r#"{"content":[]}"#, r#"{"id":"msg_1"}"#, r#"{"content":[{"type":"tool_use"}]}"#] {
            let body: serde_json::Value = serde_json::from_str(raw).unwrap();
            assert!(matches!(
                extract_message_text(&body),
                Err(GatewayError::Backend(_))
            ));
        }
    }

    #[test]
    fn parse_event_extracts_text_deltas_only() {
        let delta = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hello"}}"#;
        assert_eq!(parse_event(delta).unwrap(), Some("Hello".to_string()));

        let stop = r#"{"type":"message_stop"}"#;
        assert_eq!(parse_event(stop).unwrap(), None);

        let ping = r#"{"type":"ping"}"#;
        assert_eq!(parse_event(ping).unwrap(), None);
    }

    #[test]
    fn parse_event_rejects_malformed_json() {
        let result = parse_event("{not json");
        assert!(matches!(result, Err(GatewayError::Parse(_))));
    }

    #[test]
    fn supported_models_is_non_empty_and_ordered() {
        let provider = AnthropicProvider::new("test-key");
        assert_eq!(provider.supported_models()[0], DEFAULT_MODEL);
    }
}
