use crate::cache::{cache_key, CachedGeneration, DeterministicCache};
use crate::config::PipelineConfig;
use crate::profiles::{output_directive, RolePrompts};
use blueprint_agent::{GenerationClient, GenerationMode, GenerationRequest};
use blueprint_core::{BlueprintError, BlueprintResult, Credentials, Task};
use chrono::Utc;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

const TRUNCATION_MARKER: &str = "\n\n[... context truncated ...]\n\n";

/// Result of one dispatch.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub text: String,
    pub cache_key: String,
    pub cache_hit: bool,
}

/// Assembles prompts and calls the generation client through the
/// deterministic cache.
pub struct Dispatcher {
    client: Arc<dyn GenerationClient>,
    cache: DeterministicCache,
    prompts: RolePrompts,
    context_max_chars: usize,
    context_head_chars: usize,
    replay_chunk_chars: usize,
}

impl Dispatcher {
    pub fn new(
        client: Arc<dyn GenerationClient>,
        cache: DeterministicCache,
        prompts: RolePrompts,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            client,
            cache,
            prompts,
            context_max_chars: config.context_max_chars,
            context_head_chars: config.context_head_chars,
            replay_chunk_chars: config.replay_chunk_chars.max(1),
        }
    }

    /// System prompt (role prompt, task instruction, output directive) and the
    /// truncated context as the user prompt.
    pub fn build_request(&self, task: &Task, context: &str) -> GenerationRequest {
        let system = format!(
            "{}\n\n## Task\n{}\n\n{}",
            self.prompts.system_prompt(task.role),
            task.instruction,
            output_directive(task.section)
        );
        let user = truncate_context(context, self.context_max_chars, self.context_head_chars);
        GenerationRequest::text(system, user)
    }

    /// Generate the artifact for `task`, served from cache when the same
    /// seed, task, provider, model and prompt were seen before.
    pub async fn dispatch_task(
        &self,
        task: &Task,
        context: &str,
        credentials: &Credentials,
        seed: &str,
    ) -> BlueprintResult<DispatchOutcome> {
        let request = self.build_request(task, context);
        self.generate_cached(task.id.as_str(), &request, credentials, seed, None)
            .await
    }

    /// Like [`Dispatcher::dispatch_task`], forwarding chunks to `sink` as they
    /// arrive. A cache hit is replayed in fixed-size chunks.
    pub async fn dispatch_task_streaming(
        &self,
        task: &Task,
        context: &str,
        credentials: &Credentials,
        seed: &str,
        sink: mpsc::Sender<String>,
    ) -> BlueprintResult<DispatchOutcome> {
        let request = self.build_request(task, context);
        self.generate_cached(task.id.as_str(), &request, credentials, seed, Some(&sink))
            .await
    }

    /// A cached call outside the task plan, keyed under `scope_id`.
    pub async fn complete_cached(
        &self,
        scope_id: &str,
        system_prompt: &str,
        user_prompt: &str,
        mode: GenerationMode,
        credentials: &Credentials,
        seed: &str,
    ) -> BlueprintResult<DispatchOutcome> {
        let request = GenerationRequest {
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
            mode,
        };
        self.generate_cached(scope_id, &request, credentials, seed, None)
            .await
    }

    /// Cache key for a request. The prompt component covers both the system
    /// and the user prompt.
    pub fn request_key(
        seed: &str,
        scope_id: &str,
        credentials: &Credentials,
        request: &GenerationRequest,
    ) -> String {
        let assembled = format!("{}\n\n{}", request.system_prompt, request.user_prompt);
        cache_key(
            seed,
            scope_id,
            &credentials.provider,
            &credentials.model_id,
            &assembled,
        )
    }

    async fn generate_cached(
        &self,
        scope_id: &str,
        request: &GenerationRequest,
        credentials: &Credentials,
        seed: &str,
        sink: Option<&mpsc::Sender<String>>,
    ) -> BlueprintResult<DispatchOutcome> {
        let key = Self::request_key(seed, scope_id, credentials, request);

        if let Some(hit) = self.cache.get(&key).await? {
            info!(task_id = %scope_id, cache_hit = true, "Dispatcher: served from cache");
            if let Some(sink) = sink {
                for chunk in chunk_text(&hit.text, self.replay_chunk_chars) {
                    if sink.send(chunk).await.is_err() {
                        break;
                    }
                }
            }
            return Ok(DispatchOutcome {
                text: hit.text,
                cache_key: key,
                cache_hit: true,
            });
        }

        debug!(
            task_id = %scope_id,
            provider = %credentials.provider,
            model = %credentials.model_id,
            prompt_chars = request.user_prompt.len(),
            "Dispatcher: calling generation client"
        );
        let mut stream = self.client.generate(request, credentials).await?;
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(sink) = sink {
                // A dropped receiver does not cancel the generation.
                let _ = sink.send(chunk.clone()).await;
            }
            text.push_str(&chunk);
        }

        if text.trim().is_empty() {
            return Err(BlueprintError::Generation(format!(
                "empty response for {scope_id}"
            )));
        }

        let entry = CachedGeneration {
            text: text.clone(),
            task_id: scope_id.to_string(),
            provider: credentials.provider.clone(),
            model_id: credentials.model_id.clone(),
            created_at: Utc::now(),
        };
        self.cache.put(&key, &entry).await?;
        info!(task_id = %scope_id, cache_hit = false, chars = text.len(), "Dispatcher: generated");

        Ok(DispatchOutcome {
            text,
            cache_key: key,
            cache_hit: false,
        })
    }
}

/// Keep the first `head_chars` and the last `max_chars - head_chars`
/// characters when `context` is longer than `max_chars`.
pub fn truncate_context(context: &str, max_chars: usize, head_chars: usize) -> String {
    let total = context.chars().count();
    if total <= max_chars {
        return context.to_string();
    }
    let head_chars = head_chars.min(max_chars);
    let tail_chars = max_chars - head_chars;

    let head_end = byte_offset(context, head_chars);
    let tail_start = byte_offset(context, total - tail_chars);

    let mut out = String::with_capacity(head_end + TRUNCATION_MARKER.len() + context.len() - tail_start);
    out.push_str(&context[..head_end]);
    out.push_str(TRUNCATION_MARKER);
    out.push_str(&context[tail_start..]);
    out
}

fn byte_offset(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(i, _)| i)
}

fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blueprint_agent::TextStream;
    use blueprint_core::{AgentRole, TaskId};
    use blueprint_store::InMemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedClient {
        chunks: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedClient {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _credentials: &Credentials,
        ) -> BlueprintResult<TextStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items: Vec<BlueprintResult<String>> =
                self.chunks.iter().map(|c| Ok((*c).to_string())).collect();
            Ok(Box::pin(futures_util::stream::iter(items)))
        }
    }

    struct FailingClient;

    #[async_trait]
    impl GenerationClient for FailingClient {
        async fn generate(
            &self,
            _request: &GenerationRequest,
            _credentials: &Credentials,
        ) -> BlueprintResult<TextStream> {
            Err(BlueprintError::Http("claude API error 401: unauthorized".into()))
        }
    }

    fn dispatcher(client: Arc<dyn GenerationClient>, config: &PipelineConfig) -> Dispatcher {
        let cache = DeterministicCache::new(Arc::new(InMemoryStore::new()));
        Dispatcher::new(client, cache, RolePrompts::builtin(), config)
    }

    fn product_task() -> Task {
        Task::new(TaskId::from("task-0"), AgentRole::Product, "Write requirements")
    }

    #[tokio::test]
    async fn test_second_dispatch_is_served_from_cache() {
        let client = Arc::new(ScriptedClient::new(vec!["Hello ", "world"]));
        let d = dispatcher(client.clone(), &PipelineConfig::default());
        let creds = Credentials::new("modelA", "m-1");
        let task = product_task();

        let first = d.dispatch_task(&task, "hello", &creds, "s1").await.unwrap();
        let second = d.dispatch_task(&task, "hello", &creds, "s1").await.unwrap();

        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
        assert!(!first.cache_hit);
        assert!(second.cache_hit);
        assert_eq!(first.text, "Hello world");
        assert_eq!(second.text, first.text);
        assert_eq!(first.cache_key, second.cache_key);

        let expected = Dispatcher::request_key("s1", "task-0", &creds, &d.build_request(&task, "hello"));
        assert_eq!(first.cache_key, expected);
    }

    #[tokio::test]
    async fn test_different_seed_misses_cache() {
        let client = Arc::new(ScriptedClient::new(vec!["text"]));
        let d = dispatcher(client.clone(), &PipelineConfig::default());
        let creds = Credentials::new("claude", "m");
        let task = product_task();

        d.dispatch_task(&task, "ctx", &creds, "s1").await.unwrap();
        let revised = d.dispatch_task(&task, "ctx", &creds, "s1_rev_1").await.unwrap();
        assert!(!revised.cache_hit);
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_streaming_replays_cache_hit_in_chunks() {
        let client = Arc::new(ScriptedClient::new(vec!["abcdefghij"]));
        let config = PipelineConfig {
            replay_chunk_chars: 4,
            ..PipelineConfig::default()
        };
        let d = dispatcher(client, &config);
        let creds = Credentials::new("claude", "m");
        let task = product_task();

        let (tx, mut rx) = mpsc::channel(16);
        let live = d
            .dispatch_task_streaming(&task, "ctx", &creds, "s", tx)
            .await
            .unwrap();
        assert!(!live.cache_hit);
        assert_eq!(rx.recv().await.unwrap(), "abcdefghij");
        assert!(rx.recv().await.is_none());

        let (tx, mut rx) = mpsc::channel(16);
        let replay = d
            .dispatch_task_streaming(&task, "ctx", &creds, "s", tx)
            .await
            .unwrap();
        assert!(replay.cache_hit);
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[tokio::test]
    async fn test_collaborator_error_propagates() {
        let d = dispatcher(Arc::new(FailingClient), &PipelineConfig::default());
        let err = d
            .dispatch_task(&product_task(), "ctx", &Credentials::new("claude", "m"), "s")
            .await
            .unwrap_err();
        assert!(matches!(err, BlueprintError::Http(_)));
    }

    #[tokio::test]
    async fn test_empty_response_is_not_cached() {
        let client = Arc::new(ScriptedClient::new(vec!["  "]));
        let d = dispatcher(client.clone(), &PipelineConfig::default());
        let creds = Credentials::new("claude", "m");
        assert!(d.dispatch_task(&product_task(), "ctx", &creds, "s").await.is_err());
        assert!(d.dispatch_task(&product_task(), "ctx", &creds, "s").await.is_err());
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_build_request_layers_prompt() {
        let client = Arc::new(ScriptedClient::new(vec![]));
        let d = dispatcher(client, &PipelineConfig::default());
        let request = d.build_request(&product_task(), "the context");
        assert!(request.system_prompt.starts_with("You are a Product Manager"));
        assert!(request.system_prompt.contains("## Task\nWrite requirements"));
        assert!(request.system_prompt.contains("'Requirements'"));
        assert_eq!(request.user_prompt, "the context");
        assert_eq!(request.mode, GenerationMode::Text);
    }

    #[test]
    fn test_truncate_keeps_head_and_tail() {
        let context = format!("{}{}{}", "H".repeat(10), "m".repeat(100), "T".repeat(20));
        let out = truncate_context(&context, 30, 10);
        assert!(out.starts_with(&"H".repeat(10)));
        assert!(out.ends_with(&"T".repeat(20)));
        assert!(out.contains("context truncated"));
        assert!(!out.contains('m'));
    }

    #[test]
    fn test_truncate_short_context_untouched() {
        assert_eq!(truncate_context("short", 60_000, 10_000), "short");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let context = "é".repeat(50);
        let out = truncate_context(&context, 10, 4);
        assert!(out.starts_with("éééé\n"));
        assert!(out.ends_with("éééééé"));
    }
}
