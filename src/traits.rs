//! Core traits for LLM backends and the embedding / reranking capabilities.

use crate::error::Result;
use async_trait::async_trait;
use futures_core::Stream;
use std::collections::HashMap;
use std::pin::Pin;

/// Sampling and length parameters for one generation call.
///
/// Empty `model` selects the backend default; empty `system_prompt` omits the
/// system message entirely.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    /// Model identifier within the backend. Empty means the backend default.
    pub model: String,
    /// Sampling temperature. Backends clamp as needed.
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
    /// System prompt. Empty means none is sent.
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: 0.7,
            max_tokens: 2048,
            system_prompt: String::new(),
        }
    }
}

/// One unit of incrementally produced generation text.
///
/// A successful stream ends with exactly one [`sentinel`](Self::sentinel)
/// chunk (`is_final == true`, empty text); no chunks follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationChunk {
    pub text: String,
    pub is_final: bool,
}

impl GenerationChunk {
    /// A non-final chunk carrying `text`.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }

    /// The terminal chunk marking successful stream end.
    pub fn sentinel() -> Self {
        Self {
            text: String::new(),
            is_final: true,
        }
    }
}

/// A finite, non-restartable stream of generation chunks.
///
/// On backend failure the stream yields an `Err` item and nothing further;
/// chunks already delivered remain valid.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<GenerationChunk>> + Send>>;

/// A text-generation backend (hosted API or local daemon).
///
/// Instances hold only a client handle and are safe for concurrent calls; no
/// per-call state lives on the provider.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate the full completion for `prompt`, returning once the backend
    /// finishes.
    async fn generate(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// Open a fresh backend stream and yield chunks as the backend emits
    /// them, in emission order, terminated by the sentinel chunk.
    fn generate_stream(&self, prompt: &str, config: &GenerationConfig) -> ChunkStream;

    /// Model identifiers this backend advertises as known-good defaults.
    fn supported_models(&self) -> &[&str];
}

/// A model that produces dense vector embeddings from text.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a batch of texts into dense vectors, one `Vec<f32>` per input,
    /// each with [`dimensions()`](EmbeddingModel::dimensions) elements.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// The dimensionality of vectors produced by this model.
    fn dimensions(&self) -> u32;

    /// The underlying model identifier.
    fn model_id(&self) -> &str;
}

/// A document flowing through one rerank request. Not persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedDocument {
    pub id: String,
    pub text: String,
    /// Overwritten by [`Reranker::rerank`] with the cross-encoder score.
    pub score: f32,
    pub metadata: HashMap<String, String>,
}

/// A model that re-scores documents against a query for relevance ranking.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Recompute each document's score against `query`, then return the top
    /// `top_k` documents in descending score order. Metadata is preserved
    /// unchanged. An empty input yields an empty output.
    async fn rerank(
        &self,
        query: &str,
        documents: Vec<RankedDocument>,
        top_k: usize,
    ) -> Result<Vec<RankedDocument>>;
}
