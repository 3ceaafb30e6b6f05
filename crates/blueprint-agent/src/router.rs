use crate::backends::claude::ClaudeBackend;
use crate::backends::openai::OpenAiBackend;
use crate::backends::GenerationClient;
use crate::config::{LlmProvider, ModelConfig};
use crate::stream::{GenerationRequest, TextStream};
use async_trait::async_trait;
use blueprint_core::{BlueprintError, BlueprintResult, Credentials};

/// Generation client that dispatches to the backend named by
/// `Credentials::provider`.
pub struct HttpGenerationClient {
    claude: ClaudeBackend,
    openai: OpenAiBackend,
}

impl HttpGenerationClient {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            claude: ClaudeBackend::new(max_tokens, temperature),
            openai: OpenAiBackend::new(max_tokens, temperature),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(config.max_tokens, config.temperature)
    }

    fn backend(&self, provider: &str) -> BlueprintResult<&dyn GenerationClient> {
        match LlmProvider::parse(provider) {
            Some(LlmProvider::Claude) => Ok(&self.claude),
            Some(LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq) => {
                Ok(&self.openai)
            }
            None => Err(BlueprintError::Config(format!(
                "Unsupported provider '{provider}'"
            ))),
        }
    }
}

impl Default for HttpGenerationClient {
    fn default() -> Self {
        Self::new(4096, 0.7)
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credentials: &Credentials,
    ) -> BlueprintResult<TextStream> {
        self.backend(&credentials.provider)?
            .generate(request, credentials)
            .await
    }
}
