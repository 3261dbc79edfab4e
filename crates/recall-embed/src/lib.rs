//! Embedding side of retrieval: the LRU embedding cache, a candle BERT
//! sentence encoder, a hashing embedder for offline use, and the probe that
//! decides which one (if any) is available.
#![deny(warnings)]
#![deny(unused_imports)]

pub mod cache;
pub mod device;
pub mod encode;
pub mod hashing;
pub mod model;
pub mod pool;

use recall_core::config::MemoryLayout;
use recall_core::traits::Embedder;
use recall_core::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

pub use cache::{CacheSettings, CacheStats, EmbeddingCache};
pub use hashing::HashingEmbedder;
pub use model::{BertEmbedder, ModelSpec};
pub use pool::masked_mean_l2;

pub const FAKE_EMBEDDINGS_ENV: &str = "RECALL_USE_FAKE_EMBEDDINGS";

/// `embedding` config section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// `fast`, `better`, or a model name.
    pub model: String,
    /// Overrides `<memory>/model_cache/<model name>`.
    pub model_dir: Option<String>,
    pub use_fake: bool,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model: model::FAST.alias.to_string(), model_dir: None, use_fake: false, max_len: 256 }
    }
}

impl EmbeddingSettings {
    pub fn spec(&self) -> Result<ModelSpec> {
        ModelSpec::resolve(&self.model).ok_or_else(|| Error::InvalidConfig(format!("unknown embedding model '{}' (expected fast or better)", self.model)))
    }

    pub fn model_dir(&self, layout: &MemoryLayout) -> Result<PathBuf> {
        match &self.model_dir {
            Some(dir) => Ok(recall_core::config::expand_path(dir)),
            None => Ok(layout.model_cache_dir().join(self.spec()?.name)),
        }
    }

    fn fake_requested(&self) -> bool {
        self.use_fake || std::env::var(FAKE_EMBEDDINGS_ENV).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
    }
}

/// Capability probe for the embedding model, run once at startup.
///
/// A missing model directory or model file is `Error::MissingDependency`;
/// files that exist but fail to load are `Error::Collaborator`.
pub fn load_embedder(settings: &EmbeddingSettings, layout: &MemoryLayout) -> Result<Box<dyn Embedder>> {
    let spec = settings.spec()?;
    if settings.fake_requested() {
        tracing::info!("using hashing embedder");
        return Ok(Box::new(HashingEmbedder::new(spec.dim)));
    }
    let dir = settings.model_dir(layout)?;
    if let Some(missing) = model::missing_model_file(&dir) {
        return Err(Error::MissingDependency(format!(
            "embedding model '{}' not found ({} is missing); download {}, {} and {} into {}",
            spec.name,
            missing.display(),
            model::CONFIG_FILE,
            model::TOKENIZER_FILE,
            model::WEIGHTS_FILE,
            dir.display()
        )));
    }
    let embedder = BertEmbedder::load(spec, &dir, settings.max_len).map_err(|e| Error::Collaborator(format!("{e:#}")))?;
    Ok(Box::new(embedder))
}
