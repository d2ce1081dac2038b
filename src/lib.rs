//! gRPC model-serving gateway for embeddings, cross-encoder reranking, and
//! multi-provider LLM text generation.
//!
//! One process exposes three operations over a single RPC surface:
//!
//! - **EmbedBatch** — batch sentence embeddings from a local FastEmbed model.
//! - **Rerank** — cross-encoder relevance re-scoring with top-k selection.
//! - **Generate** — server-streamed text generation over heterogeneous LLM
//!   backends (Anthropic, OpenAI, a local Ollama daemon), normalized into one
//!   chunk stream with a single terminal sentinel.
//!
//! # Key concepts
//!
//! - **[`LlmProvider`](traits::LlmProvider)** — the uniform generation
//!   capability each backend adapter implements.
//! - **Registries** — [`LlmRegistry`](registry::LlmRegistry) and
//!   [`EmbeddingRegistry`](registry::EmbeddingRegistry) memoize one instance
//!   per key for the process lifetime, constructed lazily under a per-key
//!   lock.
//! - **[`GatewayService`](service::GatewayService)** — the tonic façade that
//!   translates between the wire and the capabilities.

pub mod config;
pub mod embedding;
pub mod error;
pub mod provider;
pub mod registry;
pub mod reranker;
pub mod service;
pub mod traits;

/// Generated protobuf and gRPC types.
pub mod pb {
    tonic::include_proto!("mlgateway.v1");
}
