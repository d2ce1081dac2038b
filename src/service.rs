//! The gRPC service façade.
//!
//! Translates wire requests into capability calls and capability errors into
//! RPC statuses. Owns no inference logic of its own.

use crate::config::GatewayConfig;
use crate::pb;
use crate::pb::ml_service_server::MlService;
use crate::registry::{EmbeddingRegistry, LlmRegistry};
use crate::traits::{GenerationConfig, RankedDocument, Reranker};
use futures_util::StreamExt;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

/// Backend used when a Generate request leaves `provider` empty.
pub const DEFAULT_LLM_PROVIDER: &str = "claude";

/// Documents returned by Rerank when the request leaves `top_k` unset.
const DEFAULT_TOP_K: usize = 10;

/// Buffered chunks between the producer task and the transport.
const STREAM_CHANNEL_CAPACITY: usize = 16;

pub struct GatewayService {
    config: GatewayConfig,
    embeddings: Arc<EmbeddingRegistry>,
    reranker: Arc<dyn Reranker>,
    llms: Arc<LlmRegistry>,
}

impl GatewayService {
    pub fn new(
        config: GatewayConfig,
        embeddings: Arc<EmbeddingRegistry>,
        reranker: Arc<dyn Reranker>,
        llms: Arc<LlmRegistry>,
    ) -> Self {
        Self {
            config,
            embeddings,
            reranker,
            llms,
        }
    }
}

#[tonic::async_trait]
impl MlService for GatewayService {
    async fn embed_batch(
        &self,
        request: Request<pb::EmbedRequest>,
    ) -> Result<Response<pb::EmbedResponse>, Status> {
        let req = request.into_inner();
        let model = if req.model.is_empty() {
            self.config.embedding_model.clone()
        } else {
            req.model
        };

        tracing::info!(texts = req.texts.len(), model = %model, "EmbedBatch");

        let embedder = self.embeddings.resolve(&model).await.map_err(Status::from)?;
        let vectors = embedder.embed(&req.texts).await.map_err(Status::from)?;

        let embeddings = vectors
            .into_iter()
            .map(|values| pb::Embedding { values })
            .collect();

        Ok(Response::new(pb::EmbedResponse {
            embeddings,
            dimensions: embedder.dimensions() as i32,
        }))
    }

    async fn rerank(
        &self,
        request: Request<pb::RerankRequest>,
    ) -> Result<Response<pb::RerankResponse>, Status> {
        let req = request.into_inner();
        let top_k = if req.top_k <= 0 {
            DEFAULT_TOP_K
        } else {
            req.top_k as usize
        };

        let documents: Vec<RankedDocument> = req
            .documents
            .into_iter()
            .map(|doc| RankedDocument {
                id: doc.id,
                text: doc.text,
                score: doc.score,
                metadata: doc.metadata,
            })
            .collect();

        tracing::info!(
            query_len = req.query.len(),
            documents = documents.len(),
            top_k,
            "Rerank"
        );

        let reranked = self
            .reranker
            .rerank(&req.query, documents, top_k)
            .await
            .map_err(Status::from)?;

        let documents = reranked
            .into_iter()
            .map(|doc| pb::RerankDocument {
                id: doc.id,
                text: doc.text,
                score: doc.score,
                metadata: doc.metadata,
            })
            .collect();

        Ok(Response::new(pb::RerankResponse { documents }))
    }

    type GenerateStream =
        Pin<Box<dyn futures_core::Stream<Item = Result<pb::GenerateChunk, Status>> + Send>>;

    async fn generate(
        &self,
        request: Request<pb::GenerateRequest>,
    ) -> Result<Response<Self::GenerateStream>, Status> {
        let req = request.into_inner();
        let provider_name = if req.provider.is_empty() {
            DEFAULT_LLM_PROVIDER.to_string()
        } else {
            req.provider
        };

        tracing::info!(provider = %provider_name, model = %req.model, "Generate");

        // Unknown providers and missing credentials surface as
        // INVALID_ARGUMENT before the stream opens.
        let provider = self
            .llms
            .resolve(&provider_name)
            .await
            .map_err(Status::from)?;

        let config = GenerationConfig {
            model: req.model,
            temperature: if req.temperature == 0.0 {
                GenerationConfig::default().temperature
            } else {
                req.temperature
            },
            max_tokens: if req.max_tokens <= 0 {
                GenerationConfig::default().max_tokens
            } else {
                req.max_tokens as u32
            },
            system_prompt: req.system_prompt,
        };

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut stream = provider.generate_stream(&req.prompt, &config);
            while let Some(item) = stream.next().await {
                let message = match item {
                    Ok(chunk) => Ok(pb::GenerateChunk {
                        text: chunk.text,
                        is_final: chunk.is_final,
                    }),
                    Err(e) => {
                        tracing::error!(provider = %provider_name, error = %e, "Generation failed");
                        Err(Status::from(e))
                    }
                };
                let failed = message.is_err();
                // A closed receiver means the caller went away; dropping the
                // stream here releases the backend connection.
                if tx.send(message).await.is_err() || failed {
                    break;
                }
            }
        });

        Ok(Response::new(Box::pin(ReceiverStream::new(rx))))
    }
}
