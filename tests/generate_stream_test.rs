//! Chunk stream contract tests: ordering, the terminal sentinel, and
//! mid-stream failure behavior.

mod common;

use common::mock_support::MockLlmProvider;
use futures_util::StreamExt;
use ml_gateway::error::GatewayError;
use ml_gateway::traits::{GenerationChunk, GenerationConfig, LlmProvider};

#[tokio::test]
async fn stream_ends_with_exactly_one_sentinel() {
    let provider = MockLlmProvider::new(&["Hello", ", ", "world"]);
    let mut stream = provider.generate_stream("hi", &GenerationConfig::default());

    let mut chunks = Vec::new();
    while let Some(item) = stream.next().await {
        chunks.push(item.unwrap());
    }

    assert_eq!(chunks.len(), 4);
    let finals = chunks.iter().filter(|c| c.is_final).count();
    assert_eq!(finals, 1);
    assert_eq!(chunks.last(), Some(&GenerationChunk::sentinel()));
}

#[tokio::test]
async fn streamed_text_concatenates_to_full_generation() {
    let provider = MockLlmProvider::new(&["The answer", " is", " 42."]);
    let config = GenerationConfig::default();

    let full = provider.generate("q", &config).await.unwrap();

    let mut stream = provider.generate_stream("q", &config);
    let mut streamed = String::new();
    while let Some(item) = stream.next().await {
        let chunk = item.unwrap();
        if !chunk.is_final {
            streamed.push_str(&chunk.text);
        }
    }

    assert!(!full.is_empty());
    assert_eq!(streamed, full);
}

#[tokio::test]
async fn mid_stream_failure_keeps_prior_chunks_and_yields_no_sentinel() {
    let provider = MockLlmProvider::new(&["one", "two", "three"]).failing_after(2);
    let mut stream = provider.generate_stream("q", &GenerationConfig::default());

    let mut texts = Vec::new();
    let mut error = None;
    while let Some(item) = stream.next().await {
        match item {
            Ok(chunk) => {
                assert!(!chunk.is_final, "no sentinel may appear on a failed stream");
                texts.push(chunk.text);
            }
            Err(e) => error = Some(e),
        }
    }

    assert_eq!(texts, vec!["one".to_string(), "two".to_string()]);
    assert!(matches!(error, Some(GatewayError::Transport(_))));
}

#[tokio::test]
async fn failure_before_first_chunk_yields_only_the_error() {
    let provider = MockLlmProvider::new(&["never"]).failing_after(0);
    let mut stream = provider.generate_stream("q", &GenerationConfig::default());

    let first = stream.next().await;
    assert!(matches!(first, Some(Err(GatewayError::Transport(_)))));
    assert!(stream.next().await.is_none());
}
