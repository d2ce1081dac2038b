//! Mock capability implementations shared by the integration tests.

#![allow(dead_code)]

use async_stream::try_stream;
use async_trait::async_trait;
use ml_gateway::error::{GatewayError, Result};
use ml_gateway::traits::{
    ChunkStream, EmbeddingModel, GenerationChunk, GenerationConfig, LlmProvider, RankedDocument,
    Reranker,
};
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};

/// Scripted LLM backend: `generate` returns the canned pieces joined;
/// `generate_stream` yields them one chunk each, then the sentinel.
pub struct MockLlmProvider {
    pieces: Vec<String>,
    fail_after: Option<usize>,
    stream_calls: AtomicU32,
    last_request: Mutex<Option<(String, GenerationConfig)>>,
}

impl MockLlmProvider {
    pub fn new(pieces: &[&str]) -> Self {
        Self {
            pieces: pieces.iter().map(|p| p.to_string()).collect(),
            fail_after: None,
            stream_calls: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    /// Fail the stream after yielding `n` text chunks (no sentinel follows).
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn stream_calls(&self) -> u32 {
        self.stream_calls.load(AtomicOrdering::SeqCst)
    }

    pub fn last_request(&self) -> Option<(String, GenerationConfig)> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        *self.last_request.lock().unwrap() = Some((prompt.to_string(), config.clone()));
        Ok(self.pieces.join(""))
    }

    fn generate_stream(&self, prompt: &str, config: &GenerationConfig) -> ChunkStream {
        self.stream_calls.fetch_add(1, AtomicOrdering::SeqCst);
        *self.last_request.lock().unwrap() = Some((prompt.to_string(), config.clone()));

        let pieces = self.pieces.clone();
        let fail_after = self.fail_after;
        Box::pin(try_stream! {
            for (i, piece) in pieces.iter().enumerate() {
                if fail_after == Some(i) {
                    Err(GatewayError::Transport("mock backend dropped".to_string()))?;
                }
                yield GenerationChunk::text(piece.clone());
            }
            if let Some(n) = fail_after {
                if n >= pieces.len() {
                    Err(GatewayError::Transport("mock backend dropped".to_string()))?;
                }
            }
            yield GenerationChunk::sentinel();
        })
    }

    fn supported_models(&self) -> &[&str] {
        &["mock-model"]
    }
}

/// Deterministic embedding model: every vector is `[0.1; dimensions]`.
pub struct MockEmbeddingModel {
    dimensions: u32,
    model_id: String,
    call_count: AtomicU32,
}

impl MockEmbeddingModel {
    pub fn new(dimensions: u32, model_id: &str) -> Self {
        Self {
            dimensions,
            model_id: model_id.to_string(),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbeddingModel {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.call_count.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(texts
            .iter()
            .map(|_| vec![0.1; self.dimensions as usize])
            .collect())
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Reranker that assigns scripted scores positionally, then applies the
/// contract: sort descending, truncate to `top_k`, preserve metadata.
pub struct MockReranker {
    scores: Vec<f32>,
}

impl MockReranker {
    pub fn new(scores: &[f32]) -> Self {
        Self {
            scores: scores.to_vec(),
        }
    }
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        mut documents: Vec<RankedDocument>,
        top_k: usize,
    ) -> Result<Vec<RankedDocument>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        for (doc, score) in documents.iter_mut().zip(self.scores.iter()) {
            doc.score = *score;
        }
        documents.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        documents.truncate(top_k);
        Ok(documents)
    }
}

/// Convenience: wrap a mock embedding model in the loader signature used by
/// `EmbeddingRegistry::with_loader`.
pub fn counting_embed_loader(
    dimensions: u32,
    load_count: Arc<AtomicU32>,
) -> ml_gateway::registry::EmbedderLoader {
    Arc::new(move |model_name, _device| {
        load_count.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Arc::new(MockEmbeddingModel::new(dimensions, model_name))
            as Arc<dyn EmbeddingModel>)
    })
}
