use anyhow::{ensure, Result};
use recall_core::corpus::Corpus;
use recall_core::traits::{Embedder, VectorStore};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndexReport {
    pub feedback_count: usize,
    pub lessons_count: usize,
}

/// Embed every document and replace each collection in `store`.
///
/// `on_progress` receives the size of each embedded batch.
pub fn index_corpus(
    embedder: &dyn Embedder,
    store: &dyn VectorStore,
    corpus: &Corpus,
    batch_size: usize,
    mut on_progress: impl FnMut(usize),
) -> Result<IndexReport> {
    for (name, docs) in corpus.collections() {
        let mut embeddings = Vec::with_capacity(docs.len());
        for batch in docs.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|d| d.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts)?;
            ensure!(vectors.len() == batch.len(), "embedder returned {} vectors for {} texts", vectors.len(), batch.len());
            for v in &vectors { ensure!(v.len() == embedder.dim(), "embedding dim {} != {}", v.len(), embedder.dim()); }
            embeddings.extend(vectors);
            on_progress(batch.len());
        }
        store.replace(name, docs, &embeddings)?;
        tracing::info!(collection = name, rows = docs.len(), model = embedder.model_id(), "indexed collection");
    }
    Ok(IndexReport { feedback_count: corpus.feedback.len(), lessons_count: corpus.lessons.len() })
}
