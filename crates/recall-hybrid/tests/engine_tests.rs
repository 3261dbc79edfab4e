use anyhow::bail;
use figment::{providers::Serialized, Figment};
use recall_core::config::Config;
use recall_core::corpus::Corpus;
use recall_core::metrics::MetricsLogger;
use recall_core::traits::VectorStore;
use recall_core::types::{Document, DocumentKind, DocumentSource, VectorHit};
use recall_core::Error;
use recall_embed::HashingEmbedder;
use recall_hybrid::{index_corpus, session_context, Capabilities, RetrievalEngine, RetrievalSettings};
use recall_vector::MemoryVectorStore;
use std::fs;
use tempfile::TempDir;

struct OfflineStore;

impl VectorStore for OfflineStore {
    fn replace(&self, _: &str, _: &[Document], _: &[Vec<f32>]) -> anyhow::Result<()> { bail!("offline") }
    fn search(&self, _: &str, _: &[f32], _: usize) -> anyhow::Result<Vec<VectorHit>> { bail!("connection refused") }
    fn collections(&self) -> anyhow::Result<Vec<String>> { bail!("offline") }
    fn count(&self, _: &str) -> anyhow::Result<usize> { bail!("offline") }
}

fn corpus() -> Corpus {
    let feedback = vec![
        Document::new("f1", DocumentKind::Feedback, "Feedback: down\nContext: the spread math totals were wrong, a mistake")
            .with_tags(["spread"])
            .with_timestamp("2026-03-01T00:00:00Z")
            .with_source(DocumentSource::Feedback { signal: Some("negative".into()), reward: Some(-1.0), action: None }),
        Document::new("f2", DocumentKind::Feedback, "Feedback: up\nContext: error handling looked great")
            .with_source(DocumentSource::Feedback { signal: Some("positive".into()), reward: Some(1.0), action: None }),
    ];
    let lessons = (0..8)
        .map(|i| Document::new(format!("l{i}"), DocumentKind::Lesson, format!("lesson {i} about error handling and retries")))
        .chain([Document::new("crit", DocumentKind::Lesson, "Title: Never skip tests\nSeverity: critical mistake")
            .with_title("Never skip tests")
            .with_source(DocumentSource::Lesson { severity: Some("critical".into()), domain: None })])
        .collect();
    Corpus::new(feedback, lessons)
}

#[test]
fn absent_vector_backend_still_answers_lexically() {
    let corpus = corpus();
    let mut engine = RetrievalEngine::new(Capabilities::none(), &RetrievalSettings::default(), None);
    assert_eq!(engine.backend_name(), "lexical");
    assert!(engine.cache_stats().is_none());

    let results = engine.search("error handling", &corpus.collections(), 5);
    assert!(!results.is_empty() && results.len() <= 5);
    assert!(results.iter().all(|r| r.preview.contains("error handling")));
}

#[test]
fn embedder_without_store_selects_lexical() {
    let caps = Capabilities::new(Some(Box::new(HashingEmbedder::new(8))), None);
    let engine = RetrievalEngine::new(caps, &RetrievalSettings::default(), None);
    assert_eq!(engine.backend_name(), "lexical");
}

#[test]
fn collaborator_failure_falls_back_and_is_logged() {
    let tmp = TempDir::new().unwrap();
    let metrics_path = tmp.path().join("query-metrics.jsonl");
    let caps = Capabilities::new(Some(Box::new(HashingEmbedder::new(8))), Some(Box::new(OfflineStore)));
    let mut engine = RetrievalEngine::new(caps, &RetrievalSettings::default(), Some(MetricsLogger::new(&metrics_path)));
    assert_eq!(engine.backend_name(), "hybrid");

    let corpus = corpus();
    let results = engine.search("error handling", &corpus.collections(), 5);
    assert_eq!(results.len(), 5);

    let log = fs::read_to_string(&metrics_path).unwrap();
    let record: serde_json::Value = serde_json::from_str(log.lines().last().unwrap()).unwrap();
    assert_eq!(record["event"], "query");
    assert_eq!(record["backend"], "hybrid");
    assert_eq!(record["degraded"], true);
    assert_eq!(record["result_count"], 5);
    assert_eq!(record["cache"]["misses"], 1);
}

#[test]
fn blank_query_returns_nothing() {
    let corpus = corpus();
    let mut engine = RetrievalEngine::new(Capabilities::none(), &RetrievalSettings::default(), None);
    assert!(engine.search("   ", &corpus.collections(), 5).is_empty());
    assert!(engine.search("error", &corpus.collections(), 0).is_empty());
}

#[test]
fn logged_query_is_truncated() {
    let tmp = TempDir::new().unwrap();
    let logger = MetricsLogger::new(tmp.path().join("m.jsonl"));
    let mut engine = RetrievalEngine::new(Capabilities::none(), &RetrievalSettings::default(), Some(logger));
    engine.search(&"error ".repeat(30), &corpus().collections(), 3);
    let summary = MetricsLogger::new(tmp.path().join("m.jsonl")).summarize(std::time::Duration::from_secs(60)).unwrap();
    assert_eq!(summary.total_queries, 1);
    let line = fs::read_to_string(tmp.path().join("m.jsonl")).unwrap();
    let record: serde_json::Value = serde_json::from_str(line.trim()).unwrap();
    assert_eq!(record["query"].as_str().unwrap().chars().count(), 50);
    assert_eq!(record["degraded"], true);
    assert_eq!(record["threshold"], 0.7);
}

#[test]
fn indexed_corpus_is_searchable_end_to_end() {
    let corpus = corpus();
    let embedder = HashingEmbedder::new(64);
    let store = MemoryVectorStore::new();
    let mut embedded = 0;
    let report = index_corpus(&embedder, &store, &corpus, 4, |n| embedded += n).unwrap();
    assert_eq!((report.feedback_count, report.lessons_count), (2, 9));
    assert_eq!(embedded, 11);
    assert_eq!(store.count("lessons_learned").unwrap(), 9);

    let caps = Capabilities::new(Some(Box::new(embedder)), Some(Box::new(store)));
    let mut engine = RetrievalEngine::new(caps, &RetrievalSettings::default(), None);
    let results = engine.search("Feedback: down. Context: the spread math totals were wrong, a mistake", &corpus.collections(), 3);
    assert_eq!(results[0].document_id, "f1");
    assert!(results[0].distance.is_some());
    assert_eq!(engine.cache_stats().unwrap().misses, 1);
}

#[test]
fn session_context_collects_critical_lessons_and_negative_feedback() {
    let corpus = corpus();
    let mut engine = RetrievalEngine::new(Capabilities::none(), &RetrievalSettings::default(), None);
    let ctx = session_context(&mut engine, &corpus);
    assert_eq!(ctx.critical_lessons.len(), 1);
    assert_eq!(ctx.critical_lessons[0].title, "Never skip tests");
    assert_eq!(ctx.negative_patterns.len(), 1);
    assert_eq!(ctx.negative_patterns[0].tags, "spread");
    assert!(ctx.recommendations.contains(&"Review critical lessons before responding".to_string()));
    assert!(ctx.recommendations.contains(&"Double-check spread calculations".to_string()));
    assert!(!ctx.recommendations.iter().any(|r| r.contains("secrets")));
}

#[test]
fn settings_read_sections_and_validate() {
    let config = Config::from_figment(
        Figment::from(Serialized::default("retrieval.vector_weight", 0.5)).merge(Serialized::default("cache.capacity", 3)),
    );
    let settings = RetrievalSettings::from_config(&config).unwrap();
    assert_eq!(settings.fusion.vector_weight, 0.5);
    assert_eq!(settings.fusion.similarity_threshold, 0.7);
    assert_eq!(settings.cache.capacity, 3);
    assert_eq!(settings.boost.bonus, 0.15);

    let bad = Config::from_figment(Figment::from(Serialized::default("retrieval.oversample", 0)));
    assert!(matches!(RetrievalSettings::from_config(&bad), Err(Error::InvalidConfig(_))));
}
