//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `RECALL_*` env vars.
//! Each crate owns the struct for its own section and extracts it by key.
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RECALL_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            other => tracing::debug!(env = other, "no environment-specific config file"),
        }
        figment = figment.merge(Env::prefixed("RECALL_").ignore(&["env"]).split("__"));

        Ok(Self { figment })
    }

    /// Build a config from an explicit figment (tests, embedding callers).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Like [`Config::get`], but a missing section falls back to `T::default()`.
    pub fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.find_value(key).is_err() {
            return Ok(T::default());
        }
        self.get(key)
    }
}

/// `storage` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub memory_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { memory_dir: ".claude/memory".to_string() }
    }
}

/// On-disk locations of corpus sources, the vector store and observability files.
#[derive(Debug, Clone)]
pub struct MemoryLayout {
    pub root: PathBuf,
}

impl MemoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_settings(settings: &StorageSettings) -> Self {
        Self::new(expand_path(&settings.memory_dir))
    }

    pub fn feedback_dir(&self) -> PathBuf { self.root.join("feedback") }
    pub fn feedback_log(&self) -> PathBuf { self.feedback_dir().join("feedback-log.jsonl") }
    pub fn hook_queue(&self) -> PathBuf { self.feedback_dir().join("pending_cortex_sync.jsonl") }
    pub fn lessons_dir(&self) -> PathBuf { self.root.join("lessons") }
    pub fn lessons_markdown(&self) -> PathBuf { self.root.join("lessons-learned.md") }
    pub fn lance_dir(&self) -> PathBuf { self.feedback_dir().join("lancedb") }
    pub fn metrics_file(&self) -> PathBuf { self.feedback_dir().join("query-metrics.jsonl") }
    pub fn index_state_file(&self) -> PathBuf { self.feedback_dir().join("lance-index-state.json") }
    pub fn model_cache_dir(&self) -> PathBuf { self.root.join("model_cache") }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
