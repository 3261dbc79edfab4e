//! `lance-index-state.json`: what the last `--index` run wrote.
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DB_TYPE: &str = "lancedb";
pub const STATE_VERSION: &str = "1.0";
pub const FEATURES: [&str; 3] = ["similarity_threshold", "lru_cache", "bm25_hybrid"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexState {
    pub last_indexed: String,
    pub feedback_count: usize,
    pub lessons_count: usize,
    /// Embedder `model_id` the vectors were produced with.
    pub model: String,
    pub db_type: String,
    pub version: String,
    #[serde(default)]
    pub features: Vec<String>,
}

impl IndexState {
    pub fn new(feedback_count: usize, lessons_count: usize, model: &str) -> Self {
        Self {
            last_indexed: Utc::now().to_rfc3339(),
            feedback_count,
            lessons_count,
            model: model.to_string(),
            db_type: DB_TYPE.to_string(),
            version: STATE_VERSION.to_string(),
            features: FEATURES.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// `None` when no index has been built yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let state = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}
