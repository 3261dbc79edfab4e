use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::Device;
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use recall_core::traits::Embedder;
use tokenizers::Tokenizer;

use crate::device::select_device;
use crate::encode::encode_batch;
use crate::pool::masked_mean_l2;

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

/// Named sentence encoders selectable with `--model`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    pub alias: &'static str,
    pub name: &'static str,
    pub dim: usize,
}

pub const FAST: ModelSpec = ModelSpec { alias: "fast", name: "all-MiniLM-L6-v2", dim: 384 };
pub const BETTER: ModelSpec = ModelSpec { alias: "better", name: "e5-small-v2", dim: 384 };

impl ModelSpec {
    /// Accepts an alias (`fast`, `better`) or a model name.
    pub fn resolve(name: &str) -> Option<ModelSpec> {
        [FAST, BETTER].into_iter().find(|m| m.alias.eq_ignore_ascii_case(name) || m.name.eq_ignore_ascii_case(name))
    }
}

/// Files a model directory must contain; returns the first one missing.
pub fn missing_model_file(dir: &Path) -> Option<PathBuf> {
    [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE].iter().map(|f| dir.join(f)).find(|p| !p.is_file())
}

/// BERT-family sentence encoder with masked mean pooling.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn load(spec: ModelSpec, model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = select_device();
        tracing::info!(model = spec.name, dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join(TOKENIZER_FILE);
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?;

        let weights_path = model_dir.join(WEIGHTS_FILE);
        // SAFETY: the weights file is memory-mapped read-only and not modified while the model lives.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)? };
        let model = BertModel::load(vb, &config)?;
        tracing::info!(model = spec.name, "sentence encoder loaded");

        Ok(Self { model, tokenizer, device, model_id: format!("bert:{}:d{}", spec.name, spec.dim), dim: spec.dim, max_len, pad_id })
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() { return Ok(Vec::new()); }
        let start = Instant::now();
        let (input_ids, attention_mask) = encode_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(v) = vectors.first() {
            anyhow::ensure!(v.len() == self.dim, "model produced dim {} (expected {})", v.len(), self.dim);
        }
        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 * texts.len() as u128 {
            tracing::debug!(batch = texts.len(), ms = elapsed.as_millis() as u64, "slow embedding batch");
        }
        Ok(vectors)
    }
}
