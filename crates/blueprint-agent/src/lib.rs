//! Model-provider collaborators for the Blueprint pipeline.
//!
//! Everything that talks to a model over the network lives here: streaming text
//! generation, JSON-mode generation, embeddings and claim fact-checking, plus
//! the retry layer that absorbs transient provider failures.
//!
//! # Main types
//!
//! - [`GenerationClient`]: Streaming generation trait consumed by the dispatcher.
//! - [`HttpGenerationClient`]: Routes a request to the backend named in the credentials.
//! - [`RetryingClient`]: Exponential-backoff wrapper for transient errors.
//! - [`FactChecker`] / [`LlmFactChecker`]: Claim verification collaborator.
//! - [`OpenAiEmbedding`]: Remote embedding provider.
//! - [`ModelConfig`]: Provider/model settings loaded from configuration.

/// Provider backends and collaborator traits.
pub mod backends;
/// Model configuration.
pub mod config;
/// Fact-checking through a JSON-mode generation call.
pub mod fact_check;
/// Retry policy and retrying client wrapper.
pub mod retry;
/// Provider routing.
pub mod router;
/// Generation request and stream types.
pub mod stream;

pub use backends::claude::ClaudeBackend;
pub use backends::openai::{OpenAiBackend, OpenAiEmbedding};
pub use backends::{FactCheckVerdict, FactChecker, GenerationClient};
pub use config::{LlmProvider, ModelConfig};
pub use fact_check::LlmFactChecker;
pub use retry::{compute_backoff, is_retryable, RetryPolicy, RetryingClient};
pub use router::HttpGenerationClient;
pub use stream::{collect_text, GenerationMode, GenerationRequest, TextStream};
