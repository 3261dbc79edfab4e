use crate::types::{Document, VectorHit};

/// Text → fixed-dimension vector. Implementations may be slow or absent;
/// callers probe for one once at startup.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g., `bert:all-MiniLM-L6-v2:d384`).
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector"))
    }
}

/// Nearest-neighbour store owning vector persistence, addressed by collection.
pub trait VectorStore: Send + Sync {
    /// Replace the full contents of `collection`.
    fn replace(&self, collection: &str, documents: &[Document], embeddings: &[Vec<f32>]) -> anyhow::Result<()>;
    /// Up to `limit` hits ordered by ascending distance; an unknown collection yields no hits.
    fn search(&self, collection: &str, query_vec: &[f32], limit: usize) -> anyhow::Result<Vec<VectorHit>>;
    fn collections(&self) -> anyhow::Result<Vec<String>>;
    fn count(&self, collection: &str) -> anyhow::Result<usize>;
}
