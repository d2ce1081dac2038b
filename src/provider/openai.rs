//! Adapter for the [OpenAI chat completions API](https://platform.openai.com/docs/api-reference/chat).

use crate::error::{GatewayError, Result};
use crate::provider::remote_common::{SseBuffer, check_http_status};
use crate::traits::{ChunkStream, GenerationChunk, GenerationConfig, LlmProvider};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const SUPPORTED_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4-turbo"];

/// Hosted chat backend speaking the chat-completions delta protocol.
///
/// Streaming events carry a content delta, a finish reason, or both. Content
/// is always delivered before the finish-reason sentinel when one event
/// carries both.
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_endpoint(api_key, CHAT_COMPLETIONS_URL)
    }

    /// Point the adapter at an alternative chat-completions endpoint
    /// (proxies, tests).
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
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
    }
}

/// Build a chat-completions payload. The system message is prepended only
/// when the config carries a non-empty system prompt.
fn build_chat_payload(prompt: &str, config: &GenerationConfig, stream: bool) -> serde_json::Value {
    let mut messages = Vec::new();
    if !config.system_prompt.is_empty() {
        messages.push(json!({ "role": "system", "content": config.system_prompt }));
    }
    messages.push(json!({ "role": "user", "content": prompt }));

    let model = if config.model.is_empty() {
        DEFAULT_MODEL
    } else {
        config.model.as_str()
    };

    let mut body = json!({
        "model": model,
        "messages": messages,
        "temperature": config.temperature,
        "max_tokens": config.max_tokens,
    });
    if stream {
        body["stream"] = json!(true);
    }
    body
}

/// Decode one streaming event into `(content delta, finish seen)`.
///
/// The delta and the finish reason are independent conditions on the same
/// event; both must be observed.
fn parse_delta_event(data: &str) -> Result<(Option<String>, bool)> {
    let event: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| GatewayError::Parse(format!("OpenAI event: {e}: {data}")))?;

    let choice = &event["choices"][0];
    let content = choice["delta"]["content"]
        .as_str()
        .filter(|c| !c.is_empty())
        .map(|c| c.to_string());
    let finished = !choice["finish_reason"].is_null();
    Ok((content, finished))
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let body = build_chat_payload(prompt, config, false);

        let response = self
            .request(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("OpenAI request failed: {e}")))?;

        let body: serde_json::Value = check_http_status("OpenAI", response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Backend(format!("OpenAI response: {e}")))?;

        // Null content (e.g. refusals) collapses to the empty string.
        Ok(body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }

    fn generate_stream(&self, prompt: &str, config: &GenerationConfig) -> ChunkStream {
        let request = self.request(&build_chat_payload(prompt, config, true));

        Box::pin(try_stream! {
            let response = request
                .send()
                .await
                .map_err(|e| GatewayError::Transport(format!("OpenAI request failed: {e}")))?;
            let response = check_http_status("OpenAI", response).await?;

            let mut sse = SseBuffer::default();
            let mut bytes = response.bytes_stream();
            let mut finished = false;

            'read: while let Some(next) = bytes.next().await {
                let chunk = next
                    .map_err(|e| GatewayError::Transport(format!("OpenAI stream failed: {e}")))?;
                for data in sse.push(&chunk) {
                    if data == "[DONE]" {
                        continue;
                    }
                    let (content, finish) = parse_delta_event(&data)?;
                    if let Some(text) = content {
                        yield GenerationChunk::text(text);
                    }
                    if finish {
                        yield GenerationChunk::sentinel();
                        finished = true;
                        break 'read;
                    }
                }
            }

            // A stream that closes without a finish reason still terminates
            // with exactly one sentinel.
            if !finished {
                yield GenerationChunk::sentinel();
            }
        })
    }

    fn supported_models(&self) -> &[&str] {
        SUPPORTED_MODELS
    }
}
