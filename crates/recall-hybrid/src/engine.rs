use recall_core::config::Config;
use recall_core::metrics::MetricsLogger;
use recall_core::traits::{Embedder, VectorStore};
use recall_core::types::QueryResult;
use recall_embed::{CacheSettings, CacheStats, EmbeddingCache};
use recall_text::Bm25Params;
use serde_json::json;
use std::time::Instant;

use crate::backend::{Collection, RankingBackend};
use crate::fusion::{FusionConfig, HybridBackend};
use crate::lexical::{KeywordBoost, LexicalOnlyBackend};

const LOGGED_QUERY_CHARS: usize = 50;

/// Collaborators found by the startup probe.
#[derive(Default)]
pub struct Capabilities {
    pub embedder: Option<Box<dyn Embedder>>,
    pub store: Option<Box<dyn VectorStore>>,
}

impl Capabilities {
    pub fn none() -> Self { Self::default() }

    pub fn new(embedder: Option<Box<dyn Embedder>>, store: Option<Box<dyn VectorStore>>) -> Self {
        Self { embedder, store }
    }
}

/// Every tuning section retrieval reads.
#[derive(Debug, Clone, Default)]
pub struct RetrievalSettings {
    pub fusion: FusionConfig,
    pub bm25: Bm25Params,
    pub boost: KeywordBoost,
    pub cache: CacheSettings,
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> recall_core::Result<Self> {
        let settings = Self {
            fusion: config.section("retrieval")?,
            bm25: config.section("bm25")?,
            boost: config.section("boost")?,
            cache: config.section("cache")?,
        };
        settings.fusion.validate()?;
        Ok(settings)
    }
}

/// Answers queries with the best backend available, falling back to lexical
/// ranking for any query whose collaborator call fails.
pub struct RetrievalEngine {
    primary: Box<dyn RankingBackend>,
    fallback: LexicalOnlyBackend,
    metrics: Option<MetricsLogger>,
    threshold: f64,
}

impl RetrievalEngine {
    /// Hybrid ranking when both an embedder and a vector store are present,
    /// lexical-only otherwise.
    pub fn new(capabilities: Capabilities, settings: &RetrievalSettings, metrics: Option<MetricsLogger>) -> Self {
        let primary: Box<dyn RankingBackend> = match (capabilities.embedder, capabilities.store) {
            (Some(embedder), Some(store)) => Box::new(HybridBackend::new(
                embedder,
                store,
                EmbeddingCache::from_settings(&settings.cache),
                settings.fusion,
                settings.bm25,
            )),
            (embedder, store) => {
                tracing::info!(embedder = embedder.is_some(), store = store.is_some(), "semantic search unavailable, using lexical ranking");
                Box::new(Self::lexical(settings))
            }
        };
        Self::with_backend(primary, settings, metrics)
    }

    /// Use an explicit primary backend.
    pub fn with_backend(primary: Box<dyn RankingBackend>, settings: &RetrievalSettings, metrics: Option<MetricsLogger>) -> Self {
        Self { primary, fallback: Self::lexical(settings), metrics, threshold: settings.fusion.similarity_threshold }
    }

    fn lexical(settings: &RetrievalSettings) -> LexicalOnlyBackend {
        LexicalOnlyBackend::new(settings.fusion, settings.bm25, settings.boost.clone())
    }

    pub fn backend_name(&self) -> &'static str { self.primary.name() }

    pub fn cache_stats(&self) -> Option<CacheStats> { self.primary.cache_stats() }

    /// Never fails: collaborator errors degrade this query to lexical ranking.
    pub fn search(&mut self, query: &str, collections: &[Collection<'_>], n_results: usize) -> Vec<QueryResult> {
        let start = Instant::now();
        let mut degraded = self.primary.name() == self.fallback.name();

        let results = if query.trim().is_empty() || n_results == 0 {
            Vec::new()
        } else {
            match self.primary.rank(query, collections, n_results) {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(backend = self.primary.name(), error = %format!("{e:#}"), "ranking failed, falling back to lexical");
                    degraded = true;
                    self.fallback.rank(query, collections, n_results).unwrap_or_else(|e| {
                        tracing::warn!(error = %e, "lexical fallback failed");
                        Vec::new()
                    })
                }
            }
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(query, results = results.len(), latency_ms, degraded, "query answered");
        if let Some(metrics) = &self.metrics {
            let fields = json!({
                "query": query.chars().take(LOGGED_QUERY_CHARS).collect::<String>(),
                "result_count": results.len(),
                "latency_ms": latency_ms,
                "threshold": self.threshold,
                "backend": self.primary.name(),
                "degraded": degraded,
                "cache": self.primary.cache_stats(),
            });
            if let Err(e) = metrics.log("query", fields) {
                tracing::warn!(error = %e, path = %metrics.path().display(), "failed to write query metrics");
            }
        }
        results
    }
}
