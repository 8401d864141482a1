use crate::storage::{self, StorageManager};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default embedding model cascade. Tried in order on first use; bge-base
/// offers better accuracy, MiniLM is the smaller fallback.
const DEFAULT_SEMANTIC_MODELS: [&str; 2] = ["bge-base-en-v1.5", "all-MiniLM-L6-v2"];

/// Configuration for the embedding/search subsystem
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SemanticSearchConfig {
    /// Candidate embedding models, attempted in order until one loads
    #[serde(default = "default_semantic_models")]
    pub models: Vec<String>,

    /// Re-embed a post inline when its text fields change. Off by default:
    /// stored embeddings go stale until the next sync run.
    #[serde(default)]
    pub reembed_on_update: bool,
}

impl Default for SemanticSearchConfig {
    fn default() -> Self {
        Self {
            models: default_semantic_models(),
            reembed_on_update: false,
        }
    }
}

fn default_semantic_models() -> Vec<String> {
    DEFAULT_SEMANTIC_MODELS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default)]
    pub semantic_search: SemanticSearchConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            semantic_search: SemanticSearchConfig::default(),
            base_path: String::new(),
        }
    }
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        if self.listen_addr.is_empty() {
            anyhow::bail!("listen_addr must not be empty");
        }

        let sem = &self.semantic_search;
        if sem.models.is_empty() {
            anyhow::bail!("semantic_search.models must list at least one model");
        }

        Ok(())
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let store = storage::BackendLocal::new(base_path).context("couldnt open config dir")?;

        // create new if does not exist
        if !store.exists("config.yaml") {
            store.write(
                "config.yaml",
                serde_yml::to_string(&Self::default())?.as_bytes(),
            )?;
        }

        let config_str = String::from_utf8(store.read("config.yaml")?)
            .context("config file is not valid utf8")?;
        let mut config: Self =
            serde_yml::from_str(&config_str).context("config is malformed")?;

        config.base_path = base_path.to_string_lossy().to_string();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let store = storage::BackendLocal::new(Path::new(&self.base_path))
            .context("couldnt open config dir")?;

        let config_str = serde_yml::to_string(&self)?;
        store.write("config.yaml", config_str.as_bytes())?;

        Ok(())
    }
}
