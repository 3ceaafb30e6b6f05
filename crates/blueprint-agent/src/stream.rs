use blueprint_core::BlueprintResult;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Incremental text chunks from a generation call.
pub type TextStream = Pin<Box<dyn Stream<Item = BlueprintResult<String>> + Send>>;

/// Output constraint requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMode {
    Text,
    /// The response must be a single JSON object.
    Json,
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub mode: GenerationMode,
}

impl GenerationRequest {
    pub fn text(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            mode: GenerationMode::Text,
        }
    }

    pub fn json(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            mode: GenerationMode::Json,
        }
    }
}

/// Drain a stream into one string. The first chunk error aborts.
pub async fn collect_text(mut stream: TextStream) -> BlueprintResult<String> {
    let mut text = String::new();
    while let Some(chunk) = stream.next().await {
        text.push_str(&chunk?);
    }
    Ok(text)
}

/// Strip a surrounding markdown code fence from a JSON-mode response.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use blueprint_core::BlueprintError;

    #[tokio::test]
    async fn test_collect_text_concatenates() {
        let stream: TextStream = Box::pin(futures_util::stream::iter(vec![
            Ok("Hello".to_string()),
            Ok(", ".to_string()),
            Ok("world".to_string()),
        ]));
        assert_eq!(collect_text(stream).await.unwrap(), "Hello, world");
    }

    #[tokio::test]
    async fn test_collect_text_propagates_error() {
        let stream: TextStream = Box::pin(futures_util::stream::iter(vec![
            Ok("partial".to_string()),
            Err(BlueprintError::Http("Stream read error".into())),
        ]));
        assert!(collect_text(stream).await.is_err());
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[]\n```"), "[]");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_request_constructors() {
        assert_eq!(GenerationRequest::text("s", "u").mode, GenerationMode::Text);
        assert_eq!(GenerationRequest::json("s", "u").mode, GenerationMode::Json);
    }
}
