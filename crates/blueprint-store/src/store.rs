use async_trait::async_trait;
use blueprint_core::{BlueprintError, BlueprintResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;

/// Generic key/value store addressed by collection name.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: &str, key: &str) -> BlueprintResult<Option<serde_json::Value>>;
    async fn put(&self, collection: &str, key: &str, value: serde_json::Value)
        -> BlueprintResult<()>;
    /// Returns whether an entry was removed.
    async fn delete(&self, collection: &str, key: &str) -> BlueprintResult<bool>;
    async fn list_keys(&self, collection: &str) -> BlueprintResult<Vec<String>>;
}

/// Serialize `value` and store it.
pub async fn put_json<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    value: &T,
) -> BlueprintResult<()> {
    let json = serde_json::to_value(value)?;
    store.put(collection, key, json).await
}

/// Load and deserialize an entry.
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
) -> BlueprintResult<Option<T>> {
    match store.get(collection, key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Process-local store.
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, HashMap<String, serde_json::Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, collection: &str, key: &str) -> BlueprintResult<Option<serde_json::Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned())
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> BlueprintResult<()> {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> BlueprintResult<bool> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|c| c.remove(key).is_some())
            .unwrap_or(false))
    }

    async fn list_keys(&self, collection: &str) -> BlueprintResult<Vec<String>> {
        let collections = self.collections.read().await;
        let mut keys: Vec<String> = collections
            .get(collection)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}

/// File-based store (one JSON file per entry, one directory per collection).
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub async fn new(dir: PathBuf) -> BlueprintResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.dir.join(sanitize(collection))
    }

    fn entry_path(&self, collection: &str, key: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", sanitize(key)))
    }
}

/// Keys become file names: keep them to a portable character set.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn get(&self, collection: &str, key: &str) -> BlueprintResult<Option<serde_json::Value>> {
        let path = self.entry_path(collection, key);
        if !path.exists() {
            return Ok(None);
        }
        let data = tokio::fs::read_to_string(&path).await?;
        let value = serde_json::from_str(&data).map_err(|e| {
            BlueprintError::Store(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        Ok(Some(value))
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        value: serde_json::Value,
    ) -> BlueprintResult<()> {
        tokio::fs::create_dir_all(self.collection_dir(collection)).await?;
        let path = self.entry_path(collection, key);
        let json = serde_json::to_string_pretty(&value)?;
        tokio::fs::write(&path, json).await?;
        debug!(collection, key, "store: put");
        Ok(())
    }

    async fn delete(&self, collection: &str, key: &str) -> BlueprintResult<bool> {
        let path = self.entry_path(collection, key);
        if path.exists() {
            tokio::fs::remove_file(path).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn list_keys(&self, collection: &str) -> BlueprintResult<Vec<String>> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Record {
        name: String,
        score: f32,
    }

    #[tokio::test]
    async fn test_in_memory_crud() {
        let store = InMemoryStore::new();
        assert!(store.get("jobs", "a").await.unwrap().is_none());

        store
            .put("jobs", "a", serde_json::json!({"status": "RUNNING"}))
            .await
            .unwrap();
        let value = store.get("jobs", "a").await.unwrap().unwrap();
        assert_eq!(value["status"], "RUNNING");

        assert!(store.delete("jobs", "a").await.unwrap());
        assert!(!store.delete("jobs", "a").await.unwrap());
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = InMemoryStore::new();
        store.put("plans", "k", serde_json::json!(1)).await.unwrap();
        assert!(store.get("jobs", "k").await.unwrap().is_none());
        assert_eq!(store.list_keys("plans").await.unwrap(), vec!["k"]);
    }

    #[tokio::test]
    async fn test_typed_helpers() {
        let store = InMemoryStore::new();
        let record = Record {
            name: "consensus".into(),
            score: 0.9,
        };
        put_json(&store, "consensus", "job_task-0", &record)
            .await
            .unwrap();
        let loaded: Record = get_json(&store, "consensus", "job_task-0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, record);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_instances() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().to_path_buf();

        {
            let store = FileStore::new(dir.clone()).await.unwrap();
            store
                .put("generation_cache", "abc123", serde_json::json!({"text": "hi"}))
                .await
                .unwrap();
        }

        let store = FileStore::new(dir).await.unwrap();
        let value = store.get("generation_cache", "abc123").await.unwrap().unwrap();
        assert_eq!(value["text"], "hi");
        assert_eq!(store.list_keys("generation_cache").await.unwrap(), vec!["abc123"]);
    }

    #[tokio::test]
    async fn test_file_store_sanitizes_keys() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();
        store
            .put("jobs", "../escape", serde_json::json!(true))
            .await
            .unwrap();
        assert!(store.get("jobs", "../escape").await.unwrap().is_some());
        assert!(!tmp.path().parent().unwrap().join("escape.json").exists());
    }

    #[tokio::test]
    async fn test_file_store_missing_collection() {
        let tmp = tempfile::TempDir::new().unwrap();
        let store = FileStore::new(tmp.path().to_path_buf()).await.unwrap();
        assert!(store.list_keys("nothing").await.unwrap().is_empty());
        assert!(!store.delete("nothing", "x").await.unwrap());
    }
}
