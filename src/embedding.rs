//! Local embedding capability using [FastEmbed](https://github.com/Anush008/fastembed-rs)
//! (ONNX Runtime).

use crate::error::{GatewayError, Result};
use crate::traits::EmbeddingModel;
use anyhow::anyhow;
use async_trait::async_trait;
use fastembed::{InitOptions, TextEmbedding};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;

/// Stack size for embedding worker threads. ONNX Runtime needs more than the
/// tokio blocking-pool default.
const EMBEDDING_THREAD_STACK_SIZE: usize = 8 * 1024 * 1024;

/// Wrapper around a loaded [`TextEmbedding`] instance.
///
/// Read-only after construction and safe for concurrent `embed` calls. Each
/// inference runs on a short-lived worker thread with an enlarged stack.
pub struct FastEmbedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    model_name: String,
    dimensions: u32,
}

impl FastEmbedEmbedder {
    /// Load the model synchronously. Callers on the async runtime should go
    /// through [`EmbeddingRegistry`](crate::registry::EmbeddingRegistry),
    /// which offloads this to a blocking task.
    ///
    /// Unknown model names are [`GatewayError::Config`] (caller-fixable);
    /// weight-loading failures are [`GatewayError::Inference`]. `device` is
    /// recorded for diagnostics only; the ONNX path runs on the CPU execution
    /// provider.
    pub fn load(model_name: &str, device: &str) -> Result<Self> {
        tracing::info!(model = %model_name, %device, "Loading embedding model");

        let model_enum = lookup_model(model_name)?;
        let dimensions = model_dimensions(&model_enum);

        let model = TextEmbedding::try_new(InitOptions::new(model_enum)).map_err(|e| {
            GatewayError::Inference(format!("Failed to initialize embedding model: {e}"))
        })?;

        tracing::info!(model = %model_name, dimensions, "Embedding model loaded");
        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: model_name.to_string(),
            dimensions,
        })
    }
}

fn lookup_model(model_name: &str) -> Result<fastembed::EmbeddingModel> {
    let model = match model_name {
        "AllMiniLML6V2" | "all-MiniLM-L6-v2" => fastembed::EmbeddingModel::AllMiniLML6V2,
        "AllMiniLML12V2" | "all-MiniLM-L12-v2" => fastembed::EmbeddingModel::AllMiniLML12V2,
        "AllMpnetBaseV2" | "all-mpnet-base-v2" => fastembed::EmbeddingModel::AllMpnetBaseV2,
        "BGESmallENV15" | "bge-small-en-v1.5" => fastembed::EmbeddingModel::BGESmallENV15,
        "BGEBaseENV15" | "bge-base-en-v1.5" => fastembed::EmbeddingModel::BGEBaseENV15,
        "BGELargeENV15" | "bge-large-en-v1.5" => fastembed::EmbeddingModel::BGELargeENV15,
        "NomicEmbedTextV15" | "nomic-embed-text-v1.5" => {
            fastembed::EmbeddingModel::NomicEmbedTextV15
        }
        "MultilingualE5Small" | "multilingual-e5-small" => {
            fastembed::EmbeddingModel::MultilingualE5Small
        }
        "MultilingualE5Base" | "multilingual-e5-base" => {
            fastembed::EmbeddingModel::MultilingualE5Base
        }
        "MultilingualE5Large" | "multilingual-e5-large" => {
            fastembed::EmbeddingModel::MultilingualE5Large
        }
        _ => {
            return Err(GatewayError::Config(format!(
                "Unsupported embedding model: {model_name}"
            )));
        }
    };
    Ok(model)
}

fn model_dimensions(model: &fastembed::EmbeddingModel) -> u32 {
    match model {
        fastembed::EmbeddingModel::AllMiniLML6V2
        | fastembed::EmbeddingModel::AllMiniLML12V2
        | fastembed::EmbeddingModel::BGESmallENV15
        | fastembed::EmbeddingModel::MultilingualE5Small => 384,

        fastembed::EmbeddingModel::AllMpnetBaseV2
        | fastembed::EmbeddingModel::BGEBaseENV15
        | fastembed::EmbeddingModel::NomicEmbedTextV15
        | fastembed::EmbeddingModel::MultilingualE5Base => 768,

        _ => 1024,
    }
}

#[async_trait]
impl EmbeddingModel for FastEmbedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts: Vec<String> = texts.to_vec();
        let model = self.model.clone();

        let (tx, rx) = oneshot::channel();

        thread::Builder::new()
            .name("fastembed-worker".to_string())
            .stack_size(EMBEDDING_THREAD_STACK_SIZE)
            .spawn(move || {
                let result = model
                    .lock()
                    .map_err(|_| anyhow!("Failed to lock embedding model"))
                    .and_then(|mut guard| {
                        guard
                            .embed(texts, None)
                            .map_err(|e| anyhow!("FastEmbed error: {}", e))
                    });
                let _ = tx.send(result);
            })
            .map_err(|e| {
                GatewayError::Inference(format!("Failed to spawn embedding thread: {e}"))
            })?;

        let result = rx
            .await
            .map_err(|_| GatewayError::Inference("Embedding thread panicked".to_string()))?;

        result.map_err(|e| GatewayError::Inference(e.to_string()))
    }

    fn dimensions(&self) -> u32 {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_names_resolve_with_dimensions() {
        let model = lookup_model("all-MiniLM-L6-v2").unwrap();
        assert_eq!(model_dimensions(&model), 384);

        let model = lookup_model("bge-base-en-v1.5").unwrap();
        assert_eq!(model_dimensions(&model), 768);
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        assert!(lookup_model("not-a-model").is_err());
    }
}
