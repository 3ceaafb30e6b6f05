use crate::backends::{FactCheckVerdict, FactChecker, GenerationClient};
use crate::stream::{collect_text, strip_code_fence, GenerationRequest};
use async_trait::async_trait;
use blueprint_core::{BlueprintError, BlueprintResult, Credentials};
use std::sync::Arc;

const FACT_CHECK_PROMPT: &str = "You are a meticulous technical fact-checker. \
Decide whether the claim is accurate according to widely published technical \
documentation. Return a JSON object {\"is_grounded\": boolean, \"sources\": [string]} \
where sources lists the documents or URLs that support your verdict.";

/// Fact-checker backed by a JSON-mode generation call.
pub struct LlmFactChecker {
    client: Arc<dyn GenerationClient>,
}

impl LlmFactChecker {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FactChecker for LlmFactChecker {
    async fn fact_check(
        &self,
        claim: &str,
        credentials: &Credentials,
    ) -> BlueprintResult<FactCheckVerdict> {
        let request = GenerationRequest::json(FACT_CHECK_PROMPT, format!("Claim: {claim}"));
        let stream = self.client.generate(&request, credentials).await?;
        let text = collect_text(stream).await?;
        serde_json::from_str(strip_code_fence(&text)).map_err(|e| {
            BlueprintError::Generation(format!("Unparseable fact-check verdict: {e}"))
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::stream::TextStream;

    struct CannedClient(&'static str);

    #[async_trait]
    impl GenerationClient for CannedClient {
        async fn generate(
            &self,
            request: &GenerationRequest,
            _credentials: &Credentials,
        ) -> BlueprintResult<TextStream> {
            assert!(request.user_prompt.starts_with("Claim: "));
            Ok(Box::pin(futures_util::stream::iter(vec![Ok(
                self.0.to_string()
            )])))
        }
    }

    fn creds() -> Credentials {
        Credentials::new("claude", "claude-sonnet-4")
    }

    #[tokio::test]
    async fn test_parses_fenced_verdict() {
        let checker = LlmFactChecker::new(Arc::new(CannedClient(
            "```json\n{\"is_grounded\": true, \"sources\": [\"https://aws.amazon.com/rds\"]}\n```",
        )));
        let verdict = checker
            .fact_check("RDS supports PostgreSQL.", &creds())
            .await
            .unwrap();
        assert!(verdict.is_grounded);
        assert_eq!(verdict.sources.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_sources_default_empty() {
        let checker = LlmFactChecker::new(Arc::new(CannedClient("{\"is_grounded\": false}")));
        let verdict = checker.fact_check("x", &creds()).await.unwrap();
        assert!(!verdict.is_grounded);
        assert!(verdict.sources.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_is_generation_error() {
        let checker = LlmFactChecker::new(Arc::new(CannedClient("I think so")));
        let result = checker.fact_check("x", &creds()).await;
        assert!(matches!(result, Err(BlueprintError::Generation(_))));
    }
}
