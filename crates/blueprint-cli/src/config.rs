use blueprint_agent::ModelConfig;
use blueprint_orchestrator::PipelineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable consulted when `[model].api_key` is empty.
pub const API_KEY_ENV: &str = "BLUEPRINT_API_KEY";

/// Contents of `blueprint.toml`.
#[derive(Debug, Deserialize)]
pub struct BlueprintConfig {
    pub model: ModelConfig,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory of `.md`/`.txt` files indexed for grounding.
    #[serde(default)]
    pub knowledge_dir: Option<PathBuf>,
    /// Remote embedding model. The local hashed embedding is used when unset.
    #[serde(default)]
    pub embedding_model: Option<String>,
    /// Fact-check claims the knowledge index cannot ground.
    #[serde(default)]
    pub fact_check: bool,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

impl BlueprintConfig {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        let mut config: BlueprintConfig = toml::from_str(&text)?;
        config.model.api_key =
            resolve_api_key(&config.model.api_key, std::env::var(API_KEY_ENV).ok());

        // Relative directories are resolved against the config file.
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.data_dir = base.join(&config.data_dir);
        config.knowledge_dir = config.knowledge_dir.map(|dir| base.join(dir));
        Ok(config)
    }
}

/// The configured key wins; the environment fills in a blank one.
pub fn resolve_api_key(configured: &str, from_env: Option<String>) -> String {
    if !configured.trim().is_empty() {
        return configured.to_string();
    }
    from_env.unwrap_or_default()
}
