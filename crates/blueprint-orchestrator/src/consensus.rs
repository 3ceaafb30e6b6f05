use blueprint_core::{Credentials, TaskId};
use blueprint_memory::{cosine_similarity, EmbeddingProvider};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

const BASE_SCORE: f32 = 0.85;
const SHORT_RESPONSE_CHARS: usize = 100;
const SHORT_PENALTY: f32 = 0.3;
const REFUSAL_PENALTY: f32 = 0.4;
const CODE_BLOCK_BONUS: f32 = 0.05;
const EMBED_CHARS: usize = 1_000;
const DRIFT_BELOW: f32 = 0.6;
const DRIFT_PENALTY: f32 = 0.1;
const ALIGNED_ABOVE: f32 = 0.8;
const ALIGNED_BONUS: f32 = 0.05;

const REFUSAL_PHRASES: &[&str] = &[
    "i'm sorry",
    "i am sorry",
    "i cannot",
    "i can't",
    "i am unable",
    "i'm unable",
    "as an ai",
];

/// One scored candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredAlternative {
    pub text: String,
    pub score: f32,
}

/// Who produced the chosen text, and when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub provider: String,
    pub model_id: String,
    pub generated_at: DateTime<Utc>,
}

/// Scored result for one task execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusItem {
    pub task_id: TaskId,
    pub final_text: String,
    /// In `[0, 1]`.
    pub confidence: f32,
    pub alternatives: Vec<ScoredAlternative>,
    pub evidence: Vec<String>,
    /// `1 - cosine similarity` to the requirements; 0 when not measured.
    pub semantic_distance: f32,
    pub provenance: Provenance,
}

/// Scores raw agent output.
#[derive(Clone, Default)]
pub struct ConsensusEngine {
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl ConsensusEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedder(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            embedder: Some(embedder),
        }
    }

    /// Score `text`. Never fails: a missing or failing embedder only skips the
    /// drift adjustment.
    pub async fn score(
        &self,
        task_id: &TaskId,
        text: &str,
        credentials: &Credentials,
        requirements_summary: Option<&str>,
    ) -> ConsensusItem {
        let (mut score, mut evidence) = heuristic_score(text);
        let mut semantic_distance = 0.0;

        if let Some(summary) = requirements_summary {
            match self.similarity(text, summary, credentials).await {
                Some(similarity) => {
                    semantic_distance = 1.0 - similarity;
                    if similarity < DRIFT_BELOW {
                        score -= DRIFT_PENALTY;
                        evidence.push(format!("possible topic drift (similarity {similarity:.2})"));
                    } else if similarity > ALIGNED_ABOVE {
                        score += ALIGNED_BONUS;
                        evidence.push(format!("aligned with requirements (similarity {similarity:.2})"));
                    }
                }
                None => {
                    warn!(task_id = %task_id, "Consensus: embedding unavailable, semantic check skipped");
                }
            }
        }

        let confidence = score.clamp(0.0, 1.0);
        debug!(task_id = %task_id, confidence, semantic_distance, "Consensus: scored");

        ConsensusItem {
            task_id: task_id.clone(),
            final_text: text.to_string(),
            confidence,
            alternatives: vec![ScoredAlternative {
                text: text.to_string(),
                score: confidence,
            }],
            evidence,
            semantic_distance,
            provenance: Provenance {
                provider: credentials.provider.clone(),
                model_id: credentials.model_id.clone(),
                generated_at: Utc::now(),
            },
        }
    }

    async fn similarity(&self, text: &str, summary: &str, credentials: &Credentials) -> Option<f32> {
        let embedder = self.embedder.as_ref()?;
        let a = embedder.embed(head(text, EMBED_CHARS), credentials).await?;
        let b = embedder.embed(head(summary, EMBED_CHARS), credentials).await?;
        if a.len() != b.len() {
            return None;
        }
        Some(cosine_similarity(&a, &b))
    }
}

/// Base score and the evidence behind each adjustment.
pub fn heuristic_score(text: &str) -> (f32, Vec<String>) {
    let mut score = BASE_SCORE;
    let mut evidence = Vec::new();
    let lower = text.to_lowercase();

    if text.trim().chars().count() < SHORT_RESPONSE_CHARS {
        score -= SHORT_PENALTY;
        evidence.push("response is very short".to_string());
    }
    if REFUSAL_PHRASES.iter().any(|p| lower.contains(p)) {
        score -= REFUSAL_PENALTY;
        evidence.push("response contains refusal language".to_string());
    }
    if text.contains("```") {
        score += CODE_BLOCK_BONUS;
        evidence.push("response includes code blocks".to_string());
    }
    (score, evidence)
}

fn head(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use blueprint_memory::LocalEmbedding;

    struct Unavailable;

    #[async_trait]
    impl EmbeddingProvider for Unavailable {
        async fn embed(&self, _text: &str, _credentials: &Credentials) -> Option<Vec<f32>> {
            None
        }
    }

    fn creds() -> Credentials {
        Credentials::new("claude", "m")
    }

    fn long_text() -> String {
        "The service exposes a REST API for managing todo items and lists. ".repeat(4)
    }

    #[tokio::test]
    async fn test_base_score() {
        let item = ConsensusEngine::new()
            .score(&TaskId::from("task-0"), &long_text(), &creds(), None)
            .await;
        assert!((item.confidence - 0.85).abs() < 1e-6);
        assert_eq!(item.semantic_distance, 0.0);
        assert_eq!(item.alternatives.len(), 1);
        assert_eq!(item.provenance.provider, "claude");
    }

    #[tokio::test]
    async fn test_short_refusal_is_penalized() {
        let item = ConsensusEngine::new()
            .score(&TaskId::from("task-0"), "I'm sorry, I cannot help.", &creds(), None)
            .await;
        assert!((item.confidence - 0.15).abs() < 1e-6);
        assert_eq!(item.evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_code_block_bonus() {
        let text = format!("{}\n```sql\nCREATE TABLE todo (id uuid);\n```", long_text());
        let item = ConsensusEngine::new()
            .score(&TaskId::from("task-1"), &text, &creds(), None)
            .await;
        assert!((item.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_aligned_text_is_rewarded() {
        let engine = ConsensusEngine::with_embedder(Arc::new(LocalEmbedding::default()));
        let text = long_text();
        let item = engine
            .score(&TaskId::from("task-2"), &text, &creds(), Some(&text))
            .await;
        assert!(item.semantic_distance < 0.01);
        assert!((item.confidence - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_drift_is_penalized() {
        let engine = ConsensusEngine::with_embedder(Arc::new(LocalEmbedding::default()));
        let item = engine
            .score(
                &TaskId::from("task-2"),
                &long_text(),
                &creds(),
                Some("Quarterly revenue forecast for coffee shops in Lisbon"),
            )
            .await;
        assert!(item.semantic_distance > 0.4);
        assert!((item.confidence - 0.75).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unavailable_embedder_keeps_base_score() {
        let engine = ConsensusEngine::with_embedder(Arc::new(Unavailable));
        let item = engine
            .score(&TaskId::from("task-3"), &long_text(), &creds(), Some("requirements"))
            .await;
        assert_eq!(item.semantic_distance, 0.0);
        assert!((item.confidence - 0.85).abs() < 1e-6);
    }
}
