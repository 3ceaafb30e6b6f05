use super::sse::{error_for_status, spawn_text_stream, transport_error, SseEvent};
use super::GenerationClient;
use crate::config::{resolve_base_url, LlmProvider};
use crate::stream::{GenerationMode, GenerationRequest, TextStream};
use async_trait::async_trait;
use blueprint_core::{BlueprintError, BlueprintResult, Credentials};
use blueprint_memory::EmbeddingProvider;
use tracing::{debug, warn};

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    http: reqwest::Client,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            http: reqwest::Client::new(),
            max_tokens,
            temperature,
        }
    }

    fn build_body(&self, request: &GenerationRequest, model_id: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model_id,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_prompt },
            ],
            "stream": true,
        });
        if request.mode == GenerationMode::Json {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new(4096, 0.7)
    }
}

fn provider_of(credentials: &Credentials) -> LlmProvider {
    LlmProvider::parse(&credentials.provider).unwrap_or(LlmProvider::OpenAi)
}

fn add_provider_headers(
    request: reqwest::RequestBuilder,
    provider: LlmProvider,
    api_key: &str,
) -> reqwest::RequestBuilder {
    let request = request
        .header("Authorization", format!("Bearer {api_key}"))
        .header("Content-Type", "application/json");
    if provider == LlmProvider::OpenRouter {
        request
            .header("HTTP-Referer", "https://github.com/blueprint")
            .header("X-Title", "Blueprint")
    } else {
        request
    }
}

#[async_trait]
impl GenerationClient for OpenAiBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credentials: &Credentials,
    ) -> BlueprintResult<TextStream> {
        let provider = provider_of(credentials);
        let url = format!(
            "{}/v1/chat/completions",
            resolve_base_url(credentials, provider)
        );
        let body = self.build_body(request, &credentials.model_id);
        debug!(provider = provider.as_str(), model = %credentials.model_id, mode = ?request.mode, "openai: generate");

        let resp = add_provider_headers(self.http.post(&url), provider, &credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let resp = error_for_status(resp, "OpenAI").await?;
        Ok(spawn_text_stream(resp, "OpenAI", parse_openai_chunk))
    }
}

fn parse_openai_chunk(chunk: &serde_json::Value) -> SseEvent {
    if let Some(message) = chunk["error"]["message"].as_str() {
        return SseEvent::Error(message.to_string());
    }
    match chunk["choices"][0]["delta"]["content"].as_str() {
        Some(text) if !text.is_empty() => SseEvent::Text(text.to_string()),
        _ => SseEvent::Skip,
    }
}

/// Remote embeddings via the OpenAI-compatible `/v1/embeddings` endpoint.
///
/// Providers other than OpenAI/OpenRouter, and any transport or decoding
/// failure, yield `None`.
pub struct OpenAiEmbedding {
    http: reqwest::Client,
    model_id: String,
}

impl OpenAiEmbedding {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            model_id: model_id.into(),
        }
    }

    async fn request(&self, text: &str, credentials: &Credentials) -> BlueprintResult<Vec<f32>> {
        let provider = provider_of(credentials);
        let url = format!("{}/v1/embeddings", resolve_base_url(credentials, provider));
        let body = serde_json::json!({ "model": self.model_id, "input": text });

        let resp = add_provider_headers(self.http.post(&url), provider, &credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;
        let resp = error_for_status(resp, "OpenAI").await?;
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| BlueprintError::Http(e.to_string()))?;

        json["data"][0]["embedding"]
            .as_array()
            .map(|values| {
                values
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect()
            })
            .ok_or_else(|| BlueprintError::Generation("Missing embedding in response".into()))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str, credentials: &Credentials) -> Option<Vec<f32>> {
        match LlmProvider::parse(&credentials.provider) {
            Some(LlmProvider::OpenAi) | Some(LlmProvider::OpenRouter) => {}
            _ => return None,
        }
        match self.request(text, credentials).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "embedding request failed");
                None
            }
        }
    }
}
