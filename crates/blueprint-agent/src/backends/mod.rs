pub mod claude;
pub mod openai;
mod sse;

use crate::stream::{GenerationRequest, TextStream};
use async_trait::async_trait;
use blueprint_core::{BlueprintResult, Credentials};
use serde::{Deserialize, Serialize};

/// Trait for generation collaborators.
///
/// Implementations stream text chunks; the dispatcher concatenates them. Any
/// error (auth, rate limit, transport) is returned as-is and never swallowed.
///
/// To add a new provider:
/// 1. Create a new module in `backends/`
/// 2. Implement `GenerationClient` for your struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Route it in `HttpGenerationClient::generate` in `router.rs`
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credentials: &Credentials,
    ) -> BlueprintResult<TextStream>;
}

/// Outcome of checking one claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactCheckVerdict {
    pub is_grounded: bool,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Web-search (or model-backed) claim verification.
#[async_trait]
pub trait FactChecker: Send + Sync {
    async fn fact_check(
        &self,
        claim: &str,
        credentials: &Credentials,
    ) -> BlueprintResult<FactCheckVerdict>;
}

/// Appended to the system prompt of providers without a native JSON mode.
pub(crate) const JSON_MODE_DIRECTIVE: &str =
    "Respond with a single valid JSON value and nothing else. Do not wrap it in markdown.";
