//! Gateway server entrypoint.

use std::sync::Arc;

use ml_gateway::config::GatewayConfig;
use ml_gateway::pb::ml_service_server::MlServiceServer;
use ml_gateway::registry::{EmbeddingRegistry, LlmRegistry};
use ml_gateway::reranker::FastEmbedReranker;
use ml_gateway::service::GatewayService;
use ml_gateway::traits::Reranker;
use tonic::transport::Server;

/// Accommodates large batch embedding requests and responses.
const MAX_MESSAGE_SIZE: usize = 100 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = GatewayConfig::from_env()?;
    tracing::info!(
        port = config.port,
        embedding_model = %config.embedding_model,
        reranker_model = %config.reranker_model,
        device = %config.device,
        "ML gateway starting"
    );

    let embeddings = Arc::new(EmbeddingRegistry::new(config.device.clone()));
    // Warm the default embedding model so first requests skip the load cost.
    embeddings.resolve(&config.embedding_model).await?;

    let reranker: Arc<dyn Reranker> =
        Arc::new(FastEmbedReranker::load(&config.reranker_model, &config.device).await?);

    let llms = Arc::new(LlmRegistry::new(config.clone()));

    let service = GatewayService::new(config.clone(), embeddings, reranker, llms);

    let addr = format!("[::]:{}", config.port).parse()?;
    tracing::info!(%addr, "ML gateway ready");

    Server::builder()
        .add_service(
            MlServiceServer::new(service)
                .max_decoding_message_size(MAX_MESSAGE_SIZE)
                .max_encoding_message_size(MAX_MESSAGE_SIZE),
        )
        .serve_with_shutdown(addr, shutdown_signal())
        .await?;

    tracing::info!("ML gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
