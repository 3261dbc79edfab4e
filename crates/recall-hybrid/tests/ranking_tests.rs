use anyhow::bail;
use recall_core::traits::{Embedder, VectorStore};
use recall_core::types::{Document, DocumentKind, VectorHit};
use recall_embed::{EmbeddingCache, HashingEmbedder};
use recall_hybrid::{fuse_collection, normalized_bm25, FusionConfig, HybridBackend, KeywordBoost, LexicalOnlyBackend, RankingBackend};
use recall_text::Bm25Params;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct StubStore {
    hits: Vec<VectorHit>,
    fail: bool,
}

impl VectorStore for StubStore {
    fn replace(&self, _: &str, _: &[Document], _: &[Vec<f32>]) -> anyhow::Result<()> { Ok(()) }
    fn search(&self, _: &str, _: &[f32], limit: usize) -> anyhow::Result<Vec<VectorHit>> {
        if self.fail { bail!("store offline"); }
        Ok(self.hits.iter().take(limit).cloned().collect())
    }
    fn collections(&self) -> anyhow::Result<Vec<String>> { Ok(Vec::new()) }
    fn count(&self, _: &str) -> anyhow::Result<usize> { Ok(0) }
}

struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: Arc<AtomicUsize>,
}

impl Embedder for CountingEmbedder {
    fn model_id(&self) -> &str { self.inner.model_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

fn hit(id: &str, distance: f64) -> VectorHit {
    VectorHit { document_id: id.into(), distance }
}

fn lessons() -> Vec<Document> {
    vec![
        Document::new("a", DocumentKind::Lesson, "error handling in the parser was wrong"),
        Document::new("b", DocumentKind::Lesson, "always add error handling for network calls"),
        Document::new("c", DocumentKind::Lesson, "gardening notes about tomatoes"),
    ]
}

fn hybrid(hits: Vec<VectorHit>, fail: bool) -> HybridBackend {
    HybridBackend::new(
        Box::new(HashingEmbedder::new(16)),
        Box::new(StubStore { hits, fail }),
        EmbeddingCache::new(8),
        FusionConfig::default(),
        Bm25Params::default(),
    )
}

#[test]
fn candidates_beyond_threshold_are_excluded() {
    let docs = lessons();
    let mut backend = hybrid(vec![hit("a", 0.1), hit("c", 0.9)], false);
    let results = backend.rank("tomatoes", &[("lessons_learned", docs.as_slice())], 5).unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["a"], "distance 0.9 > 0.7 never appears even with a BM25 match");
    assert_eq!(results[0].distance, Some(0.1));
}

#[test]
fn combined_score_blends_vector_and_bm25() {
    let docs = lessons();
    let config = FusionConfig::default();
    let results = fuse_collection("parser", "lessons_learned", &docs, &[hit("a", 0.0), hit("b", 0.35)], &config, Bm25Params::default(), 5);
    assert_eq!(results.len(), 2);
    assert!((results[0].combined_score - 1.0).abs() < 1e-9, "exact vector + top BM25 = vw + bw");
    assert!((results[1].combined_score - 0.35).abs() < 1e-9, "half distance, no BM25 match");
    for r in &results {
        assert!(r.combined_score >= 0.0 && r.combined_score <= config.vector_weight + config.bm25_weight);
    }
}

#[test]
fn stale_duplicate_and_nan_hits_are_skipped() {
    let docs = lessons();
    let results = fuse_collection(
        "error",
        "lessons_learned",
        &docs,
        &[hit("gone", 0.0), hit("b", 0.2), hit("b", 0.3), hit("a", f64::NAN)],
        &FusionConfig::default(),
        Bm25Params::default(),
        5,
    );
    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["b"]);
}

#[test]
fn zero_bm25_maximum_normalizes_to_zero() {
    let docs = lessons();
    let norm = normalized_bm25("zebra", &docs, Bm25Params::default(), 6);
    assert!(norm.values().all(|s| *s == 0.0));
    let norm = normalized_bm25("error handling", &docs, Bm25Params::default(), 6);
    let max = norm.values().cloned().fold(0.0, f64::max);
    assert!((max - 1.0).abs() < 1e-12);
}

#[test]
fn bm25_component_is_normalized_after_weighting() {
    let docs = vec![
        Document::new("heavy", DocumentKind::Lesson, "retry the flaky upload").with_weight(2.0),
        Document::new("light", DocumentKind::Lesson, "retry the flaky upload"),
    ];
    let norm = normalized_bm25("flaky upload", &docs, Bm25Params::default(), 2);
    assert!((norm[&0] - 1.0).abs() < 1e-12);
    assert!((norm[&1] - 0.5).abs() < 1e-12);
}

#[test]
fn results_are_sorted_across_collections_and_truncated() {
    let docs = lessons();
    let feedback = vec![Document::new("f", DocumentKind::Feedback, "error handling regression")];
    let mut backend = hybrid(vec![hit("a", 0.5), hit("b", 0.2), hit("f", 0.05)], false);
    let results = backend
        .rank("error handling", &[("rlhf_feedback", feedback.as_slice()), ("lessons_learned", docs.as_slice())], 2)
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.windows(2).all(|w| w[0].combined_score >= w[1].combined_score));
    assert_eq!(results[0].document_id, "f");
    assert_eq!(results[0].table, "rlhf_feedback");
}

#[test]
fn query_embeddings_are_cached() {
    let calls = Arc::new(AtomicUsize::new(0));
    let embedder = CountingEmbedder { inner: HashingEmbedder::new(16), calls: calls.clone() };
    let mut backend = HybridBackend::new(
        Box::new(embedder),
        Box::new(StubStore { hits: vec![hit("a", 0.1)], fail: false }),
        EmbeddingCache::new(4),
        FusionConfig::default(),
        Bm25Params::default(),
    );
    let docs = lessons();
    for _ in 0..3 {
        backend.rank("parser error", &[("lessons_learned", docs.as_slice())], 3).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let stats = backend.cache_stats().expect("hybrid exposes cache stats");
    assert_eq!((stats.hits, stats.misses, stats.size), (2, 1, 1));
}

#[test]
fn store_failure_surfaces_as_error() {
    let docs = lessons();
    let mut backend = hybrid(Vec::new(), true);
    assert!(backend.rank("error", &[("lessons_learned", docs.as_slice())], 3).is_err());
}

#[test]
fn lexical_backend_ranks_jointly_and_drops_non_matches() {
    let docs = lessons();
    let feedback = vec![Document::new("f", DocumentKind::Feedback, "error handling regression").with_weight(2.0)];
    let mut backend = LexicalOnlyBackend::default();
    let results = backend
        .rank("error handling", &[("rlhf_feedback", feedback.as_slice()), ("lessons_learned", docs.as_slice())], 5)
        .unwrap();
    let ids: Vec<_> = results.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids.len(), 3, "gardening note has no matching term: {ids:?}");
    assert_eq!(ids[0], "f", "weight doubles the raw score");
    assert!(results.iter().all(|r| r.combined_score > 0.0 && r.distance.is_none()));
}

#[test]
fn keyword_boost_requires_query_and_document_match() {
    let docs = vec![
        Document::new("1", DocumentKind::Feedback, "the assistant lied about tests passing"),
        Document::new("2", DocumentKind::Feedback, "tests passing were verified twice"),
    ];
    let mut backend = LexicalOnlyBackend::new(FusionConfig::default(), Bm25Params::default(), KeywordBoost::default());
    let results = backend.rank("you lied about tests", &[("rlhf_feedback", docs.as_slice())], 5).unwrap();
    let boosted = results.iter().find(|r| r.document_id == "1").unwrap();
    let plain = results.iter().find(|r| r.document_id == "2").unwrap();
    assert!((boosted.combined_score - boosted.bm25_component.unwrap() - 0.15).abs() < 1e-9);
    assert!((plain.combined_score - plain.bm25_component.unwrap()).abs() < 1e-9);

    let mut no_boost = LexicalOnlyBackend::new(FusionConfig::default(), Bm25Params::default(), KeywordBoost::disabled());
    let results = no_boost.rank("you lied about tests", &[("rlhf_feedback", docs.as_slice())], 5).unwrap();
    assert!(results.iter().all(|r| (r.combined_score - r.bm25_component.unwrap()).abs() < 1e-9));
}

#[test]
fn keyword_terms_support_phrases_and_prefixes() {
    let boost = KeywordBoost::default();
    assert!(boost.matches("the numbers were made up"));
    assert!(!boost.matches("I made it up"));
    assert!(boost.matches("it Hallucinated three APIs"));
    assert!(boost.matches("a false promise about delivery"));
    assert!(!boost.matches("I believe this is fine"));
    assert!(!boost.matches(""));
}

#[test]
fn empty_inputs_produce_empty_results() {
    let docs = lessons();
    let mut lexical = LexicalOnlyBackend::default();
    assert!(lexical.rank("error", &[], 5).unwrap().is_empty());
    assert!(lexical.rank("error", &[("lessons_learned", docs.as_slice())], 0).unwrap().is_empty());
    let none: Vec<Document> = Vec::new();
    let mut backend = hybrid(vec![hit("a", 0.1)], false);
    assert!(backend.rank("error", &[("lessons_learned", none.as_slice())], 5).unwrap().is_empty());
}
