//! Shared utilities for the HTTP backend adapters: status mapping, credential
//! resolution, and incremental stream decoding buffers.

use crate::error::{GatewayError, Result};

/// Read a backend credential from the environment.
///
/// A missing or empty value is a [`GatewayError::Config`] so the failure
/// surfaces as caller-fixable at first provider resolution.
pub(crate) fn resolve_api_key(env_var: &str) -> Result<String> {
    match std::env::var(env_var) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(GatewayError::Config(format!("{env_var} not set"))),
    }
}

/// Map a non-success HTTP response to a [`GatewayError::Backend`] that
/// preserves the upstream status and body. Returns the response unchanged
/// when the status is 2xx.
pub(crate) async fn check_http_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        Err(GatewayError::Backend(format!("{backend} API error: {status}")))
    } else {
        Err(GatewayError::Backend(format!(
            "{backend} API error: {status}: {body}"
        )))
    }
}

/// Incremental decoder for Server-Sent Events.
///
/// Feed raw body bytes with [`push`](Self::push); complete event blocks
/// (terminated by a blank line) are reduced to their `data:` payloads.
/// [`drain`](Self::drain) flushes a trailing block after the body ends.
#[derive(Default)]
pub(crate) struct SseBuffer {
    buf: String,
}

impl SseBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
        let mut payloads = Vec::new();
        while let Some(pos) = self.buf.find("\n\n") {
            let block = self.buf[..pos].to_owned();
            self.buf = self.buf[pos + 2..].to_owned();
            if let Some(data) = extract_data(&block) {
                payloads.push(data);
            }
        }
        payloads
    }

    pub(crate) fn drain(&mut self) -> Vec<String> {
        let block = std::mem::take(&mut self.buf);
        if block.trim().is_empty() {
            return Vec::new();
        }
        extract_data(&block).into_iter().collect()
    }
}

/// Pull the `data:` payload out of one SSE block, ignoring `event:` and
/// comment lines. Multiple `data:` lines in one block are joined with
/// newlines, per the SSE dispatch rules.
fn extract_data(block: &str) -> Option<String> {
    let mut data: Vec<&str> = Vec::new();
    for line in block.lines() {
        if let Some(d) = line.strip_prefix("data:") {
            data.push(d.trim());
        }
    }
    if data.is_empty() {
        return None;
    }
    Some(data.join("\n")).filter(|d| !d.is_empty())
}

/// Incremental decoder for newline-delimited payloads.
#[derive(Default)]
pub(crate) struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.push_str(&String::from_utf8_lossy(bytes));
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line = self.buf[..pos].trim_end_matches('\r').to_owned();
            self.buf = self.buf[pos + 1..].to_owned();
            if !line.is_empty() {
                lines.push(line);
            }
        }
        lines
    }

    pub(crate) fn drain(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buf);
        let line = line.trim();
        if line.is_empty() {
            None
        } else {
            Some(line.to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_buffer_splits_complete_blocks() {
        let mut buf = SseBuffer::default();
        let payloads = buf.push(b"event: delta\ndata: {\"a\":1}\n\ndata: {\"b\":2}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}", "{\"b\":2}"]);
    }

    #[test]
    fn sse_buffer_joins_multiple_data_lines_with_newlines() {
        let mut buf = SseBuffer::default();
        let payloads = buf.push(b"data: line one\ndata: line two\n\n");
        assert_eq!(payloads, vec!["line one\nline two"]);
    }

    #[test]
    fn sse_buffer_holds_partial_blocks_across_pushes() {
        let mut buf = SseBuffer::default();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        let payloads = buf.push(b":1}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn sse_buffer_drains_unterminated_trailing_block() {
        let mut buf = SseBuffer::default();
        assert!(buf.push(b"data: tail").is_empty());
        assert_eq!(buf.drain(), vec!["tail"]);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn line_buffer_splits_and_skips_blank_lines() {
        let mut buf = LineBuffer::default();
        let lines = buf.push(b"{\"a\":1}\r\n\n{\"b\":2}\npartial");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert_eq!(buf.drain(), Some("partial".to_owned()));
    }

    #[test]
    fn resolve_api_key_missing_is_config_error() {
        let result = resolve_api_key("MLGW_TEST_KEY_THAT_DOES_NOT_EXIST");
        assert!(matches!(result, Err(GatewayError::Config(_))));
    }
}
