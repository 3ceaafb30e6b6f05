use super::sse::{error_for_status, spawn_text_stream, transport_error, SseEvent};
use super::{GenerationClient, JSON_MODE_DIRECTIVE};
use crate::config::{resolve_base_url, LlmProvider};
use crate::stream::{GenerationMode, GenerationRequest, TextStream};
use async_trait::async_trait;
use blueprint_core::{BlueprintResult, Credentials};
use tracing::debug;

/// Claude (Anthropic Messages API) streaming backend.
pub struct ClaudeBackend {
    http: reqwest::Client,
    max_tokens: u32,
    temperature: f32,
}

impl ClaudeBackend {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            http: reqwest::Client::new(),
            max_tokens,
            temperature,
        }
    }

    fn build_body(&self, request: &GenerationRequest, model_id: &str) -> serde_json::Value {
        let system = match request.mode {
            GenerationMode::Text => request.system_prompt.clone(),
            GenerationMode::Json => format!("{}\n\n{}", request.system_prompt, JSON_MODE_DIRECTIVE),
        };
        serde_json::json!({
            "model": model_id,
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
            "system": system,
            "messages": [{ "role": "user", "content": request.user_prompt }],
            "stream": true,
        })
    }
}

impl Default for ClaudeBackend {
    fn default() -> Self {
        Self::new(4096, 0.7)
    }
}

#[async_trait]
impl GenerationClient for ClaudeBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
        credentials: &Credentials,
    ) -> BlueprintResult<TextStream> {
        let url = format!(
            "{}/v1/messages",
            resolve_base_url(credentials, LlmProvider::Claude)
        );
        let body = self.build_body(request, &credentials.model_id);
        debug!(model = %credentials.model_id, mode = ?request.mode, "claude: generate");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &credentials.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Claude", e))?;

        let resp = error_for_status(resp, "Claude").await?;
        Ok(spawn_text_stream(resp, "Claude", parse_claude_event))
    }
}

fn parse_claude_event(event: &serde_json::Value) -> SseEvent {
    match event["type"].as_str().unwrap_or("") {
        "content_block_delta" => {
            let delta = &event["delta"];
            match (delta["type"].as_str(), delta["text"].as_str()) {
                (Some("text_delta"), Some(text)) => SseEvent::Text(text.to_string()),
                _ => SseEvent::Skip,
            }
        }
        "message_stop" => SseEvent::Done,
        "error" => SseEvent::Error(
            event["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        ),
        _ => SseEvent::Skip,
    }
}
