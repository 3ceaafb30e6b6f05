use blueprint_core::BlueprintResult;
use blueprint_store::collections::GENERATION_CACHE;
use blueprint_store::{get_json, put_json, DocumentStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// A memoized generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedGeneration {
    pub text: String,
    pub task_id: String,
    pub provider: String,
    pub model_id: String,
    pub created_at: DateTime<Utc>,
}

/// Hex SHA-256 of the assembled prompt.
pub fn prompt_hash(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// Content address of one generation.
///
/// Components are length-prefixed before hashing.
pub fn cache_key(seed: &str, task_id: &str, provider: &str, model_id: &str, prompt: &str) -> String {
    let prompt_digest = prompt_hash(prompt);
    let mut hasher = Sha256::new();
    for part in [seed, task_id, provider, model_id, prompt_digest.as_str()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Deterministic generation cache over the document store.
#[derive(Clone)]
pub struct DeterministicCache {
    store: Arc<dyn DocumentStore>,
}

impl DeterministicCache {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> BlueprintResult<Option<CachedGeneration>> {
        get_json(self.store.as_ref(), GENERATION_CACHE, key).await
    }

    pub async fn put(&self, key: &str, entry: &CachedGeneration) -> BlueprintResult<()> {
        put_json(self.store.as_ref(), GENERATION_CACHE, key, entry).await
    }
}
