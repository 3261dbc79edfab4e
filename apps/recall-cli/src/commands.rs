use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use recall_core::config::{Config, MemoryLayout, StorageSettings};
use recall_core::corpus::Corpus;
use recall_core::metrics::MetricsLogger;
use recall_core::traits::{Embedder, VectorStore};
use recall_embed::{load_embedder, EmbeddingSettings};
use recall_hybrid::{index_corpus, session_context, Capabilities, RetrievalEngine, RetrievalSettings};
use recall_vector::LanceVectorStore;
use serde_json::json;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use crate::state::IndexState;

const EMBED_BATCH: usize = 32;
const METRICS_WINDOW_DAYS: u64 = 7;
const RULE: &str = "==================================================";

/// Resolved configuration for one CLI invocation.
pub struct App {
    pub layout: MemoryLayout,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
}

impl App {
    pub fn from_config(config: &Config, memory_dir: Option<PathBuf>, model: Option<String>) -> Result<Self> {
        let storage: StorageSettings = config.section("storage")?;
        let layout = match memory_dir {
            Some(dir) => MemoryLayout::new(dir),
            None => MemoryLayout::from_settings(&storage),
        };
        let mut embedding: EmbeddingSettings = config.section("embedding")?;
        if let Some(model) = model {
            embedding.model = model;
        }
        embedding.spec()?;
        Ok(Self { layout, retrieval: RetrievalSettings::from_config(config)?, embedding })
    }

    pub fn metrics(&self) -> MetricsLogger {
        MetricsLogger::new(self.layout.metrics_file())
    }

    pub fn load_corpus(&self) -> Result<Corpus> {
        Corpus::load(&self.layout).with_context(|| format!("loading memory from {}", self.layout.root.display()))
    }

    /// Collaborators usable for querying. Anything missing, or an index built
    /// with a different model, leaves the engine lexical.
    ///
    /// Errors that are not about a missing or failing collaborator, such as an
    /// unknown model alias, are returned instead of degrading.
    pub fn probe(&self) -> Result<Capabilities> {
        let embedder = match load_embedder(&self.embedding, &self.layout) {
            Ok(embedder) => embedder,
            Err(e) if e.is_degradable() => {
                tracing::info!(error = %e, "embedding model unavailable");
                return Ok(Capabilities::none());
            }
            Err(e) => return Err(e.into()),
        };
        let state = match IndexState::load(&self.layout.index_state_file()) {
            Ok(Some(state)) => state,
            Ok(None) => {
                tracing::info!("vector index not built yet");
                return Ok(Capabilities::new(Some(embedder), None));
            }
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "unreadable index state");
                return Ok(Capabilities::new(Some(embedder), None));
            }
        };
        if state.model != embedder.model_id() {
            tracing::warn!(indexed = %state.model, current = embedder.model_id(), "index built with a different model; re-run --index");
            return Ok(Capabilities::new(Some(embedder), None));
        }
        match LanceVectorStore::open(&self.layout.lance_dir(), embedder.dim()) {
            Ok(store) => Ok(Capabilities::new(Some(embedder), Some(Box::new(store)))),
            Err(e) => {
                tracing::warn!(error = %format!("{e:#}"), "vector store unavailable");
                Ok(Capabilities::new(Some(embedder), None))
            }
        }
    }
}

/// Embed the whole corpus into LanceDB and record the index state.
///
/// A missing embedding model surfaces as `recall_core::Error::MissingDependency`.
pub fn run_index(app: &App, out: &mut dyn Write) -> Result<IndexState> {
    let embedder = load_embedder(&app.embedding, &app.layout)?;
    let lance_dir = app.layout.lance_dir();
    writeln!(out, "\nIndexing into LanceDB...")?;
    writeln!(out, "   Model: {}", embedder.model_id())?;
    writeln!(out, "   Storage: {}", lance_dir.display())?;

    let store = LanceVectorStore::open(&lance_dir, embedder.dim())?;
    let corpus = app.load_corpus()?;
    let state = index_with(embedder.as_ref(), &store, &corpus, out)?;
    state.save(&app.layout.index_state_file())?;

    let fields = json!({"feedback_count": state.feedback_count, "lessons_count": state.lessons_count, "model": state.model});
    if let Err(e) = app.metrics().log("index", fields) {
        tracing::warn!(error = %e, "failed to write index metrics");
    }
    writeln!(out, "\n✅ Indexing complete!")?;
    writeln!(out, "   Total documents: {}", state.feedback_count + state.lessons_count)?;
    Ok(state)
}

fn index_with(embedder: &dyn Embedder, store: &dyn VectorStore, corpus: &Corpus, out: &mut dyn Write) -> Result<IndexState> {
    writeln!(out, "   Feedback entries: {}", corpus.feedback.len())?;
    writeln!(out, "   Lessons: {}", corpus.lessons.len())?;
    let pb = ProgressBar::new(corpus.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let report = index_corpus(embedder, store, corpus, EMBED_BATCH, |n| pb.inc(n as u64))?;
    pb.finish_with_message("embedded");
    Ok(IndexState::new(report.feedback_count, report.lessons_count, embedder.model_id()))
}

pub fn run_query(app: &App, query: &str, n_results: usize, out: &mut dyn Write) -> Result<usize> {
    let corpus = app.load_corpus()?;
    let mut engine = RetrievalEngine::new(app.probe()?, &app.retrieval, Some(app.metrics()));
    let results = engine.search(query, &corpus.collections(), n_results);

    writeln!(out, "\nFound {} results ({}):\n", results.len(), engine.backend_name())?;
    for (i, r) in results.iter().enumerate() {
        writeln!(out, "{}. [{}] {}", i + 1, r.table, r.title)?;
        writeln!(out, "   Score: {:.3}", r.combined_score)?;
        let preview: String = r.preview.chars().take(100).collect();
        writeln!(out, "   Preview: {preview}...")?;
        writeln!(out)?;
    }
    Ok(results.len())
}

pub fn run_context(app: &App, out: &mut dyn Write) -> Result<()> {
    let corpus = app.load_corpus()?;
    let mut engine = RetrievalEngine::new(app.probe()?, &app.retrieval, Some(app.metrics()));
    let ctx = session_context(&mut engine, &corpus);

    writeln!(out, "\n{RULE}\nSEMANTIC MEMORY CONTEXT ({})\n{RULE}", engine.backend_name())?;
    if !ctx.critical_lessons.is_empty() {
        writeln!(out, "\nCRITICAL LESSONS:")?;
        for lesson in &ctx.critical_lessons {
            writeln!(out, "   [{}] {}", lesson.severity.to_uppercase(), lesson.title)?;
        }
    }
    if !ctx.negative_patterns.is_empty() {
        writeln!(out, "\nNEGATIVE PATTERNS TO AVOID:")?;
        for p in &ctx.negative_patterns {
            writeln!(out, "   - {}", p.context)?;
        }
    }
    if !ctx.recommendations.is_empty() {
        writeln!(out, "\nRECOMMENDATIONS:")?;
        for rec in &ctx.recommendations {
            writeln!(out, "   * {rec}")?;
        }
    }
    writeln!(out, "\n{RULE}")?;
    Ok(())
}

pub fn run_status(app: &App, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "\nSemantic Memory Status (LanceDB)\n{RULE}")?;
    let state = IndexState::load(&app.layout.index_state_file())?;
    match &state {
        Some(state) => {
            writeln!(out, "   Last indexed: {}", state.last_indexed)?;
            writeln!(out, "   Feedback: {}", state.feedback_count)?;
            writeln!(out, "   Lessons: {}", state.lessons_count)?;
            writeln!(out, "   Model: {}", state.model)?;
        }
        None => writeln!(out, "   Index not built yet. Run --index first.")?,
    }

    let lance_dir = app.layout.lance_dir();
    if lance_dir.exists() {
        let dim = app.embedding.spec()?.dim;
        match LanceVectorStore::open(&lance_dir, dim).and_then(|store| list_tables(&store)) {
            Ok(tables) => {
                writeln!(out, "\n   Tables: {}", tables.len())?;
                for (name, rows) in tables {
                    writeln!(out, "      {name}: {rows} documents")?;
                }
            }
            Err(e) => writeln!(out, "   LanceDB error: {e:#}")?,
        }
    }
    writeln!(out, "{RULE}")?;
    Ok(())
}

fn list_tables(store: &dyn VectorStore) -> Result<Vec<(String, usize)>> {
    let mut tables = Vec::new();
    for name in store.collections()? {
        let rows = store.count(&name)?;
        tables.push((name, rows));
    }
    Ok(tables)
}

pub fn run_metrics(app: &App, out: &mut dyn Write) -> Result<()> {
    let summary = app.metrics().summarize(Duration::from_secs(METRICS_WINDOW_DAYS * 86_400))?;
    writeln!(out, "\nQuery Metrics (Last {METRICS_WINDOW_DAYS} Days)\n{RULE}")?;
    writeln!(out, "   Total queries: {}", summary.total_queries)?;
    writeln!(out, "   Avg latency: {:.1}ms", summary.avg_latency_ms)?;
    writeln!(out, "   Feedback events: {}", summary.feedback_events)?;
    writeln!(out, "   Index runs: {}", summary.index_events)?;
    match summary.cache {
        Some(cache) => writeln!(
            out,
            "   Cache: {} hits / {} misses ({:.1}% hit rate)",
            cache.hits,
            cache.misses,
            cache.hit_rate * 100.0
        )?,
        None => writeln!(out, "   Cache: no data")?,
    }
    writeln!(out, "{RULE}")?;
    Ok(())
}
