//! Adapter for a local [Ollama](https://github.com/ollama/ollama) generation
//! daemon reached over plain HTTP.

use crate::error::{GatewayError, Result};
use crate::provider::remote_common::{LineBuffer, check_http_status};
use crate::traits::{ChunkStream, GenerationChunk, GenerationConfig, LlmProvider};
use async_stream::try_stream;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const DEFAULT_MODEL: &str = "llama3";
const SUPPORTED_MODELS: &[&str] = &["llama3", "mistral", "codellama", "phi3"];

/// Local inference can be slow; allow generous time per request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Local daemon backend. Streaming responses are newline-delimited JSON; a
/// line with `"done": true` terminates the stream.
pub struct OllamaProvider {
    host: String,
    client: Client,
}

impl OllamaProvider {
    /// `host` is the daemon base address, e.g. `http://localhost:11434`.
    /// The HTTP client is built once here and shared across calls.
    pub fn new(host: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/generate", self.host)
    }
}

/// Build the `/api/generate` request body.
fn build_generate_payload(
    prompt: &str,
    config: &GenerationConfig,
    stream: bool,
) -> serde_json::Value {
    let model = if config.model.is_empty() {
        DEFAULT_MODEL
    } else {
        config.model.as_str()
    };

    json!({
        "model": model,
        "prompt": prompt,
        "system": config.system_prompt,
        "options": {
            "temperature": config.temperature,
            "num_predict": config.max_tokens,
        },
        "stream": stream,
    })
}

/// Decode one newline-delimited JSON line into a chunk.
///
/// A truthy `done` field becomes the sentinel; otherwise the line's
/// `response` field (empty if absent) becomes a text chunk. Malformed JSON
/// fails the whole stream.
fn parse_stream_line(line: &str) -> Result<GenerationChunk> {
    let data: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| GatewayError::Parse(format!("Ollama stream line: {e}: {line}")))?;

    if data.get("done").and_then(|d| d.as_bool()).unwrap_or(false) {
        return Ok(GenerationChunk::sentinel());
    }
    Ok(GenerationChunk::text(
        data.get("response").and_then(|r| r.as_str()).unwrap_or(""),
    ))
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let body = build_generate_payload(prompt, config, false);

        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(format!("Ollama request failed: {e}")))?;

        let body: serde_json::Value = check_http_status("Ollama", response)
            .await?
            .json()
            .await
            .map_err(|e| GatewayError::Backend(format!("Ollama response: {e}")))?;

        body.get("response")
            .and_then(|r| r.as_str())
            .map(|r| r.to_string())
            .ok_or_else(|| {
                GatewayError::Backend("Ollama response missing \"response\" field".to_string())
            })
    }

    fn generate_stream(&self, prompt: &str, config: &GenerationConfig) -> ChunkStream {
        let request = self
            .client
            .post(self.endpoint())
            .json(&build_generate_payload(prompt, config, true));

        Box::pin(try_stream! {
            let response = request
                .send()
                .await
                .map_err(|e| GatewayError::Transport(format!("Ollama request failed: {e}")))?;
            let response = check_http_status("Ollama", response).await?;

            let mut lines = LineBuffer::default();
            let mut bytes = response.bytes_stream();
            let mut finished = false;
            'read: while let Some(next) = bytes.next().await {
                let chunk = next
                    .map_err(|e| GatewayError::Transport(format!("Ollama stream failed: {e}")))?;
                for line in lines.push(&chunk) {
                    let parsed = parse_stream_line(&line)?;
                    let done = parsed.is_final;
                    yield parsed;
                    if done {
                        // Trailing lines after the done marker are ignored.
                        finished = true;
                        break 'read;
                    }
                }
            }

            if !finished {
                if let Some(line) = lines.drain() {
                    let parsed = parse_stream_line(&line)?;
                    finished = parsed.is_final;
                    yield parsed;
                }
            }

            // A daemon that closes the connection without a done line still
            // terminates the sequence with exactly one sentinel.
            if !finished {
                yield GenerationChunk::sentinel();
            }
        })
    }

    fn supported_models(&self) -> &[&str] {
        SUPPORTED_MODELS
    }
}
