use serde::{Deserialize, Serialize};

/// Provider credentials handed to the generation, embedding and fact-check collaborators.
///
/// `provider` and `model_id` are part of every cache key.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub provider: String,
    pub model_id: String,
    #[serde(default, skip_serializing)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Credentials {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            api_key: String::new(),
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = key.into();
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

// Keys never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("provider", &self.provider)
            .field("model_id", &self.model_id)
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_key() {
        let creds = Credentials::new("claude", "claude-sonnet-4").with_api_key("sk-secret");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_key_not_serialized() {
        let creds = Credentials::new("openai", "gpt-4o").with_api_key("sk-secret");
        let json = serde_json::to_string(&creds).unwrap();
        assert!(!json.contains("sk-secret"));
        assert!(json.contains("gpt-4o"));
    }
}
