//! Cross-encoder reranking capability using FastEmbed's rerank models.

use crate::error::{GatewayError, Result};
use crate::traits::{RankedDocument, Reranker};
use anyhow::anyhow;
use async_trait::async_trait;
use fastembed::{RerankInitOptions, TextRerank};
use std::cmp::Ordering;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;

/// Same enlarged stack as the embedding workers; both run ONNX Runtime.
const RERANK_THREAD_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Wrapper around a loaded [`TextRerank`] cross-encoder.
///
/// One instance is loaded at startup and shared across requests. Scoring runs
/// on a short-lived worker thread per call.
pub struct FastEmbedReranker {
    model: Arc<Mutex<TextRerank>>,
    model_name: String,
}

impl FastEmbedReranker {
    /// Load the cross-encoder synchronously.
    ///
    /// `device` is recorded for diagnostics only; the ONNX path runs on the
    /// CPU execution provider.
    pub fn new(model_name: &str, device: &str) -> anyhow::Result<Self> {
        tracing::info!(model = %model_name, %device, "Loading reranker model");

        let model_enum = match model_name {
            "BGERerankerBase" | "bge-reranker-base" => fastembed::RerankerModel::BGERerankerBase,
            "BGERerankerV2M3" | "bge-reranker-v2-m3" => fastembed::RerankerModel::BGERerankerV2M3,
            "JINARerankerV1TurboEn" | "jina-reranker-v1-turbo-en" => {
                fastembed::RerankerModel::JINARerankerV1TurboEn
            }
            _ => {
                return Err(anyhow!("Unsupported reranker model: {}", model_name));
            }
        };

        let model = TextRerank::try_new(RerankInitOptions::new(model_enum))
            .map_err(|e| anyhow!("Failed to initialize reranker model: {}", e))?;

        tracing::info!(model = %model_name, "Reranker model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: model_name.to_string(),
        })
    }

    /// Load on a blocking task so the async runtime is not stalled by weight
    /// loading.
    pub async fn load(model_name: &str, device: &str) -> Result<Self> {
        let model_name = model_name.to_string();
        let device = device.to_string();
        tokio::task::spawn_blocking(move || Self::new(&model_name, &device))
            .await
            .map_err(|e| GatewayError::Inference(format!("Reranker load task failed: {e}")))?
            .map_err(|e| GatewayError::Inference(e.to_string()))
    }

    pub fn model_id(&self) -> &str {
        &self.model_name
    }
}

#[async_trait]
impl Reranker for FastEmbedReranker {
    async fn rerank(
        &self,
        query: &str,
        mut documents: Vec<RankedDocument>,
        top_k: usize,
    ) -> Result<Vec<RankedDocument>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.model.clone();
        let query = query.to_string();
        let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

        let (tx, rx) = oneshot::channel();

        thread::Builder::new()
            .name("rerank-worker".to_string())
            .stack_size(RERANK_THREAD_STACK_SIZE)
            .spawn(move || {
                let result = model
                    .lock()
                    .map_err(|_| anyhow!("Failed to lock reranker model"))
                    .and_then(|mut guard| {
                        guard
                            .rerank(query, texts, false, None)
                            .map_err(|e| anyhow!("Rerank error: {}", e))
                    });
                let _ = tx.send(result);
            })
            .map_err(|e| GatewayError::Inference(format!("Failed to spawn rerank thread: {e}")))?;

        let results = rx
            .await
            .map_err(|_| GatewayError::Inference("Rerank thread panicked".to_string()))?
            .map_err(|e| GatewayError::Inference(e.to_string()))?;

        for result in results {
            if let Some(doc) = documents.get_mut(result.index) {
                doc.score = result.score;
            }
        }

        documents.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        documents.truncate(top_k);
        Ok(documents)
    }
}
