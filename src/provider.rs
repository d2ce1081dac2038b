//! LLM backend adapters.
//!
//! Each sub-module implements [`LlmProvider`](crate::traits::LlmProvider) for
//! one backend family:
//!
//! | Module | Backend | Streaming wire format |
//! |--------|---------|-----------------------|
//! | `anthropic` | Anthropic Messages API | SSE text deltas |
//! | `openai` | OpenAI chat completions | SSE delta/finish events |
//! | `ollama` | local Ollama daemon | newline-delimited JSON |
//!
//! Adapters are constructed by the [`LlmRegistry`](crate::registry::LlmRegistry),
//! one instance per backend name for the process lifetime.

pub(crate) mod remote_common;

pub mod anthropic;
pub mod ollama;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
