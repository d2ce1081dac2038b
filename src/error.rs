//! Error types for the ML gateway.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Unified error type covering configuration, backend, and inference failures.
///
/// Variants are intentionally coarse-grained so that callers can match on
/// error *category* rather than on backend-specific details. The RPC boundary
/// maps [`Config`](Self::Config) to `INVALID_ARGUMENT` and everything else to
/// `INTERNAL`.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or missing configuration (unknown provider name, credential
    /// env var not set, unparsable setting).
    #[error("Configuration error: {0}")]
    Config(String),

    /// A non-success or malformed response from an upstream model API.
    #[error("Backend error: {0}")]
    Backend(String),

    /// A malformed streaming payload from a backend. The stream is aborted.
    #[error("Malformed stream payload: {0}")]
    Parse(String),

    /// A connection-level failure reaching a backend (refused, timed out,
    /// reset mid-stream).
    #[error("Transport error: {0}")]
    Transport(String),

    /// A local model inference failure (embedding or reranking).
    #[error("Inference error: {0}")]
    Inference(String),
}

impl From<GatewayError> for tonic::Status {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Config(msg) => tonic::Status::invalid_argument(msg),
            other => tonic::Status::internal(other.to_string()),
        }
    }
}
