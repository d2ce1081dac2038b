//! Lazy, memoizing registries for LLM backends and embedding models.
//!
//! Both registries share the same shape: a read-mostly instance cache plus a
//! per-key construction lock so that concurrent first access builds exactly
//! one instance. First successful construction wins and is reused for the
//! process lifetime; failed constructions are never cached.

use crate::config::GatewayConfig;
use crate::embedding::FastEmbedEmbedder;
use crate::error::{GatewayError, Result};
use crate::provider::remote_common::resolve_api_key;
use crate::provider::{AnthropicProvider, OllamaProvider, OpenAiProvider};
use crate::traits::{EmbeddingModel, LlmProvider};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";

/// Per-key lock map shared by both registries.
///
/// Lock entries are removed once a construction attempt completes; waiters
/// already hold cloned lock Arcs, so removal is safe.
#[derive(Default)]
struct InitLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl InitLocks {
    async fn acquire(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn release(&self, key: &str) {
        let mut locks = self.locks.lock().await;
        locks.remove(key);
    }
}

/// Memoizing factory for [`LlmProvider`] instances, keyed by backend name.
///
/// Known backends: `"claude"`, `"openai"` (credential presence checked before
/// construction), and `"ollama"` (no credential). Unknown names and missing
/// credentials are [`GatewayError::Config`].
pub struct LlmRegistry {
    config: GatewayConfig,
    providers: RwLock<HashMap<String, Arc<dyn LlmProvider>>>,
    init_locks: InitLocks,
}

impl LlmRegistry {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            providers: RwLock::new(HashMap::new()),
            init_locks: InitLocks::default(),
        }
    }

    /// Pre-register a custom backend under `name`. Used to plug in
    /// alternative [`LlmProvider`] implementations without touching the
    /// built-in construction table.
    pub async fn register(&self, name: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        let mut providers = self.providers.write().await;
        providers.insert(name.into(), provider);
    }

    /// Return the memoized provider for `name`, constructing it on first use.
    pub async fn resolve(&self, name: &str) -> Result<Arc<dyn LlmProvider>> {
        // Fast path: already constructed
        {
            let providers = self.providers.read().await;
            if let Some(provider) = providers.get(name) {
                return Ok(provider.clone());
            }
        }

        let lock = self.init_locks.acquire(name).await;
        let _guard = lock.lock().await;

        // Double-check after acquiring the construction lock
        {
            let providers = self.providers.read().await;
            if let Some(provider) = providers.get(name) {
                let provider = provider.clone();
                self.init_locks.release(name).await;
                return Ok(provider);
            }
        }

        let result = self.build(name);
        match &result {
            Ok(provider) => {
                let mut providers = self.providers.write().await;
                providers.insert(name.to_string(), provider.clone());
                metrics::counter!("llm_provider.init.total", "status" => "success").increment(1);
                tracing::info!(provider = %name, "Initialized LLM provider");
            }
            Err(e) => {
                metrics::counter!("llm_provider.init.total", "status" => "failure").increment(1);
                tracing::warn!(provider = %name, error = %e, "LLM provider init failed");
            }
        }

        self.init_locks.release(name).await;
        result
    }

    /// Credential presence is checked here, before any backend state is
    /// built.
    fn build(&self, name: &str) -> Result<Arc<dyn LlmProvider>> {
        match name {
            "claude" => {
                let api_key = resolve_api_key(ANTHROPIC_KEY_ENV)?;
                Ok(Arc::new(AnthropicProvider::new(api_key)))
            }
            "openai" => {
                let api_key = resolve_api_key(OPENAI_KEY_ENV)?;
                Ok(Arc::new(OpenAiProvider::new(api_key)))
            }
            "ollama" => Ok(Arc::new(OllamaProvider::new(&self.config.ollama_host)?)),
            other => Err(GatewayError::Config(format!(
                "Unknown LLM provider: {other}"
            ))),
        }
    }

    /// Number of cached provider instances.
    pub async fn cached_count(&self) -> usize {
        let providers = self.providers.read().await;
        providers.len()
    }
}

/// Loader callback used by [`EmbeddingRegistry`]. Runs on a blocking task.
pub type EmbedderLoader =
    Arc<dyn Fn(&str, &str) -> Result<Arc<dyn EmbeddingModel>> + Send + Sync>;

/// Memoizing factory for embedding models, keyed by model name only (the
/// device is fixed for the process lifetime).
///
/// Unlike [`LlmRegistry`] construction, a cache miss here loads model weights
/// and is therefore expensive; the per-key lock prevents duplicated loads.
pub struct EmbeddingRegistry {
    device: String,
    loader: EmbedderLoader,
    models: RwLock<HashMap<String, Arc<dyn EmbeddingModel>>>,
    init_locks: InitLocks,
}

impl EmbeddingRegistry {
    pub fn new(device: impl Into<String>) -> Self {
        Self::with_loader(
            device,
            Arc::new(|model_name, device| {
                FastEmbedEmbedder::load(model_name, device)
                    .map(|m| Arc::new(m) as Arc<dyn EmbeddingModel>)
            }),
        )
    }

    /// Construct with a custom loader. This is the seam for alternative
    /// embedding engines (and for tests).
    pub fn with_loader(device: impl Into<String>, loader: EmbedderLoader) -> Self {
        Self {
            device: device.into(),
            loader,
            models: RwLock::new(HashMap::new()),
            init_locks: InitLocks::default(),
        }
    }

    /// Pre-register a model instance under `model_name`.
    pub async fn register(&self, model_name: impl Into<String>, model: Arc<dyn EmbeddingModel>) {
        let mut models = self.models.write().await;
        models.insert(model_name.into(), model);
    }

    /// Return the memoized model for `model_name`, loading it on first use.
    pub async fn resolve(&self, model_name: &str) -> Result<Arc<dyn EmbeddingModel>> {
        {
            let models = self.models.read().await;
            if let Some(model) = models.get(model_name) {
                return Ok(model.clone());
            }
        }

        let lock = self.init_locks.acquire(model_name).await;
        let _guard = lock.lock().await;

        {
            let models = self.models.read().await;
            if let Some(model) = models.get(model_name) {
                let model = model.clone();
                self.init_locks.release(model_name).await;
                return Ok(model);
            }
        }

        let loader = self.loader.clone();
        let name = model_name.to_string();
        let device = self.device.clone();

        let start = std::time::Instant::now();
        let result = tokio::task::spawn_blocking(move || loader(&name, &device))
            .await
            .map_err(|e| GatewayError::Inference(format!("Embedding load task failed: {e}")))
            .and_then(|r| r);
        metrics::histogram!("embedding_model.load_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match &result {
            Ok(model) => {
                let mut models = self.models.write().await;
                models.insert(model_name.to_string(), model.clone());
                metrics::counter!("embedding_model.load.total", "status" => "success").increment(1);
            }
            Err(e) => {
                metrics::counter!("embedding_model.load.total", "status" => "failure").increment(1);
                tracing::error!(model = %model_name, error = %e, "Embedding model load failed");
            }
        }

        self.init_locks.release(model_name).await;
        result
    }

    /// Number of cached model instances.
    pub async fn cached_count(&self) -> usize {
        let models = self.models.read().await;
        models.len()
    }
}
