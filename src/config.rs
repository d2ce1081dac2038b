//! Environment-backed process configuration.
//!
//! All settings have defaults; override with `MLGW_*` environment variables.
//! LLM backend credentials (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`) are *not*
//! part of this struct — they are read from the environment at first provider
//! resolution so that a missing key fails the request that needs it, not
//! process startup.

use crate::error::{GatewayError, Result};
use std::env;

/// Gateway configuration loaded once at startup. Cheap to clone.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// gRPC listening port. Default: `50051`.
    pub port: u16,

    /// Default embedding model name used when a request leaves `model` empty.
    pub embedding_model: String,

    /// Cross-encoder reranker model name.
    pub reranker_model: String,

    /// Base address of the local generation daemon. Default:
    /// `http://localhost:11434`.
    pub ollama_host: String,

    /// Compute device selector (`"cpu"`, `"cuda"`, `"mps"`). Passed through to
    /// model-loading collaborators, not interpreted by the gateway itself.
    pub device: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: 50051,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            reranker_model: "bge-reranker-base".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            device: "cpu".to_string(),
        }
    }
}

impl GatewayConfig {
    const ENV_PORT: &'static str = "MLGW_PORT";
    const ENV_EMBEDDING_MODEL: &'static str = "MLGW_EMBEDDING_MODEL";
    const ENV_RERANKER_MODEL: &'static str = "MLGW_RERANKER_MODEL";
    const ENV_OLLAMA_HOST: &'static str = "OLLAMA_HOST";
    const ENV_DEVICE: &'static str = "MLGW_DEVICE";

    /// Loads configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match env::var(Self::ENV_PORT) {
            Ok(raw) => raw.parse::<u16>().map_err(|_| {
                GatewayError::Config(format!("{} is not a valid port: {raw}", Self::ENV_PORT))
            })?,
            Err(_) => defaults.port,
        };

        Ok(Self {
            port,
            embedding_model: string_from_env(Self::ENV_EMBEDDING_MODEL, defaults.embedding_model),
            reranker_model: string_from_env(Self::ENV_RERANKER_MODEL, defaults.reranker_model),
            ollama_host: string_from_env(Self::ENV_OLLAMA_HOST, defaults.ollama_host),
            device: string_from_env(Self::ENV_DEVICE, defaults.device),
        })
    }
}

fn string_from_env(key: &str, default: String) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn defaults_match_service_conventions() {
        let config = GatewayConfig::default();
        assert_eq!(config.port, 50051);
        assert_eq!(config.embedding_model, "all-MiniLM-L6-v2");
        assert_eq!(config.ollama_host, "http://localhost:11434");
        assert_eq!(config.device, "cpu");
    }

    #[test]
    fn invalid_port_is_a_config_error() {
        let _lock = ENV_LOCK.lock().unwrap();
        // SAFETY: protected by ENV_LOCK
        unsafe { env::set_var(GatewayConfig::ENV_PORT, "not-a-port") };
        let result = GatewayConfig::from_env();
        assert!(matches!(result, Err(GatewayError::Config(_))));
        // SAFETY: protected by ENV_LOCK
        unsafe { env::remove_var(GatewayConfig::ENV_PORT) };
    }

    #[test]
    fn env_overrides_are_applied() {
        let _lock = ENV_LOCK.lock().unwrap();
        // SAFETY: protected by ENV_LOCK
        unsafe { env::set_var(GatewayConfig::ENV_PORT, "50099") };
        // SAFETY: protected by ENV_LOCK
        unsafe { env::set_var(GatewayConfig::ENV_DEVICE, "cuda") };

        let config = GatewayConfig::from_env().unwrap();
        assert_eq!(config.port, 50099);
        assert_eq!(config.device, "cuda");

        // SAFETY: protected by ENV_LOCK
        unsafe { env::remove_var(GatewayConfig::ENV_PORT) };
        // SAFETY: protected by ENV_LOCK
        unsafe { env::remove_var(GatewayConfig::ENV_DEVICE) };
    }
}
