//! BM25 + vector similarity fusion.
use anyhow::Result;
use recall_core::traits::{Embedder, VectorStore};
use recall_core::types::{Document, QueryResult, VectorHit};
use recall_core::Error;
use recall_embed::{CacheStats, EmbeddingCache};
use recall_text::{Bm25Index, Bm25Params};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::backend::{sort_and_truncate, Collection, RankingBackend};

/// `retrieval` config section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Maximum vector distance a candidate may have.
    pub similarity_threshold: f64,
    pub vector_weight: f64,
    pub bm25_weight: f64,
    /// Candidates fetched per side, as a multiple of `n_results`.
    pub oversample: usize,
    pub preview_chars: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self { similarity_threshold: 0.7, vector_weight: 0.7, bm25_weight: 0.3, oversample: 2, preview_chars: 200 }
    }
}

impl FusionConfig {
    pub fn validate(&self) -> recall_core::Result<()> {
        if !(self.similarity_threshold.is_finite() && self.similarity_threshold > 0.0) {
            return Err(Error::InvalidConfig(format!("retrieval.similarity_threshold must be positive, got {}", self.similarity_threshold)));
        }
        if self.vector_weight.is_nan() || self.bm25_weight.is_nan() || self.vector_weight < 0.0 || self.bm25_weight < 0.0 {
            return Err(Error::InvalidConfig("retrieval weights must be non-negative".into()));
        }
        if self.oversample == 0 {
            return Err(Error::InvalidConfig("retrieval.oversample must be at least 1".into()));
        }
        Ok(())
    }

    pub fn candidates(&self, n_results: usize) -> usize {
        n_results.saturating_mul(self.oversample.max(1))
    }

    /// `1 - distance/threshold` clamped to `[0, 1]`; `None` when the distance is
    /// NaN or beyond the threshold.
    pub fn vector_score(&self, distance: f64) -> Option<f64> {
        if distance.is_nan() || distance > self.similarity_threshold {
            return None;
        }
        Some((1.0 - distance / self.similarity_threshold).clamp(0.0, 1.0))
    }
}

/// Weighted BM25 scores of the top candidates, divided by their maximum.
///
/// Each raw score is multiplied by its document's `weight` before the
/// maximum is taken, so the value that becomes a result's `bm25_component`
/// is `raw * weight / max(raw * weight)`, not `raw / max(raw)`.
/// Keys are positions in `docs`; documents outside the candidate set are
/// absent (score 0). A maximum of 0 normalizes every candidate to 0.
pub fn normalized_bm25(query: &str, docs: &[Document], params: Bm25Params, top_k: usize) -> HashMap<usize, f64> {
    let index = Bm25Index::fitted(params, &docs.iter().map(|d| d.text.as_str()).collect::<Vec<_>>());
    let weighted: Vec<(usize, f64)> = index.search(query, top_k).into_iter().map(|(i, s)| (i, s * docs[i].weight)).collect();
    let max = weighted.iter().map(|(_, s)| *s).fold(0.0, f64::max);
    weighted.into_iter().map(|(i, s)| (i, if max > 0.0 { s / max } else { 0.0 })).collect()
}

/// Fuse one collection's vector hits with its BM25 scores.
///
/// Hits beyond the threshold, with NaN distance, repeated, or naming a
/// document missing from `docs` are dropped.
pub fn fuse_collection(
    query: &str,
    table: &str,
    docs: &[Document],
    hits: &[VectorHit],
    config: &FusionConfig,
    bm25: Bm25Params,
    n_results: usize,
) -> Vec<QueryResult> {
    let bm25_norm = normalized_bm25(query, docs, bm25, config.candidates(n_results));
    let positions: HashMap<&str, usize> = docs.iter().enumerate().map(|(i, d)| (d.id.as_str(), i)).collect();
    let mut seen = HashSet::new();
    let mut results = Vec::new();
    for hit in hits {
        let Some(vector_score) = config.vector_score(hit.distance) else { continue };
        let Some(&pos) = positions.get(hit.document_id.as_str()) else {
            tracing::debug!(table, id = %hit.document_id, "skipping vector hit missing from snapshot");
            continue;
        };
        if !seen.insert(pos) { continue; }
        let bm25_score = bm25_norm.get(&pos).copied().unwrap_or(0.0);
        let combined = config.vector_weight * vector_score + config.bm25_weight * bm25_score;
        results.push(
            QueryResult::from_document(table, &docs[pos], combined, config.preview_chars)
                .with_distance(hit.distance)
                .with_bm25(bm25_score),
        );
    }
    results
}

pub struct HybridBackend {
    embedder: Box<dyn Embedder>,
    store: Box<dyn VectorStore>,
    cache: EmbeddingCache,
    config: FusionConfig,
    bm25: Bm25Params,
}

impl HybridBackend {
    pub fn new(embedder: Box<dyn Embedder>, store: Box<dyn VectorStore>, cache: EmbeddingCache, config: FusionConfig, bm25: Bm25Params) -> Self {
        Self { embedder, store, cache, config, bm25 }
    }

    pub fn config(&self) -> &FusionConfig { &self.config }

    fn query_vector(&mut self, query: &str) -> Result<Vec<f32>> {
        if let Some(v) = self.cache.get(query) {
            return Ok(v.to_vec());
        }
        let v = self.embedder.embed(query)?;
        self.cache.put(query, v.clone());
        Ok(v)
    }
}

impl RankingBackend for HybridBackend {
    fn name(&self) -> &'static str { "hybrid" }

    fn rank(&mut self, query: &str, collections: &[Collection<'_>], n_results: usize) -> Result<Vec<QueryResult>> {
        if n_results == 0 || collections.iter().all(|(_, docs)| docs.is_empty()) {
            return Ok(Vec::new());
        }
        let query_vec = self.query_vector(query)?;
        let limit = self.config.candidates(n_results);
        let mut results = Vec::new();
        for (table, docs) in collections {
            if docs.is_empty() { continue; }
            let hits = self.store.search(table, &query_vec, limit)?;
            results.extend(fuse_collection(query, table, docs, &hits, &self.config, self.bm25, n_results));
        }
        sort_and_truncate(&mut results, n_results);
        Ok(results)
    }

    fn cache_stats(&self) -> Option<CacheStats> { Some(self.cache.stats()) }
}
