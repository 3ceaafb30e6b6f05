use crate::embedding::{cosine_similarity, LocalEmbedding};
use async_trait::async_trait;
use blueprint_core::BlueprintResult;
use std::path::Path;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

/// A passage returned by a knowledge lookup.
#[derive(Debug, Clone)]
pub struct KnowledgeHit {
    pub id: Uuid,
    pub source: String,
    pub content: String,
    pub similarity: f32,
}

/// Similarity lookup over trusted reference material.
#[async_trait]
pub trait KnowledgeIndex: Send + Sync {
    /// Top-k passages for `query`, best first.
    async fn search(&self, query: &str, top_k: usize) -> BlueprintResult<Vec<KnowledgeHit>>;
}

struct IndexedPassage {
    id: Uuid,
    source: String,
    content: String,
    embedding: Vec<f32>,
}

/// In-memory index using brute-force cosine similarity over local embeddings.
pub struct LocalKnowledgeIndex {
    embedding: LocalEmbedding,
    passages: RwLock<Vec<IndexedPassage>>,
}

impl LocalKnowledgeIndex {
    pub fn new() -> Self {
        Self {
            embedding: LocalEmbedding::default(),
            passages: RwLock::new(Vec::new()),
        }
    }

    /// Index one passage. Returns false if it had no embeddable words.
    pub async fn add_passage(&self, source: impl Into<String>, content: impl Into<String>) -> bool {
        let content = content.into();
        let Some(embedding) = self.embedding.embed_text(&content) else {
            return false;
        };
        self.passages.write().await.push(IndexedPassage {
            id: Uuid::new_v4(),
            source: source.into(),
            content,
            embedding,
        });
        true
    }

    /// Split a document into paragraph passages and index each one.
    pub async fn add_document(&self, source: &str, text: &str) -> usize {
        let mut added = 0;
        for paragraph in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if self.add_passage(source, paragraph).await {
                added += 1;
            }
        }
        added
    }

    /// Index every `.md` / `.txt` file directly under `dir`.
    pub async fn load_dir(&self, dir: &Path) -> BlueprintResult<usize> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut total = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_text = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("txt"))
                .unwrap_or(false);
            if !is_text {
                continue;
            }
            let text = tokio::fs::read_to_string(&path).await?;
            let source = path.display().to_string();
            let added = self.add_document(&source, &text).await;
            debug!(source = %source, passages = added, "knowledge: indexed file");
            total += added;
        }
        info!(dir = %dir.display(), passages = total, "knowledge index loaded");
        Ok(total)
    }

    pub async fn len(&self) -> usize {
        self.passages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.passages.read().await.is_empty()
    }
}

impl Default for LocalKnowledgeIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KnowledgeIndex for LocalKnowledgeIndex {
    async fn search(&self, query: &str, top_k: usize) -> BlueprintResult<Vec<KnowledgeHit>> {
        let Some(query_embedding) = self.embedding.embed_text(query) else {
            return Ok(Vec::new());
        };

        let passages = self.passages.read().await;
        let mut scored: Vec<KnowledgeHit> = passages
            .iter()
            .map(|p| KnowledgeHit {
                id: p.id,
                source: p.source.clone(),
                content: p.content.clone(),
                similarity: cosine_similarity(&query_embedding, &p.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}
