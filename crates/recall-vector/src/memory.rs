use anyhow::{ensure, Result};
use recall_core::traits::VectorStore;
use recall_core::types::{Document, VectorHit};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Cosine-distance (`1 - cos`) store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryVectorStore {
	collections: RwLock<BTreeMap<String, Vec<(String, Vec<f32>)>>>,
}

impl MemoryVectorStore {
	pub fn new() -> Self { Self::default() }
}

pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
	let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
	for (x, y) in a.iter().zip(b) {
		let (x, y) = (*x as f64, *y as f64);
		dot += x * y;
		na += x * x;
		nb += y * y;
	}
	if na == 0.0 || nb == 0.0 { return 1.0; }
	1.0 - dot / (na.sqrt() * nb.sqrt())
}

impl VectorStore for MemoryVectorStore {
	fn replace(&self, collection: &str, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
		ensure!(documents.len() == embeddings.len(), "documents and embeddings length must match ({} vs {})", documents.len(), embeddings.len());
		let rows = documents.iter().zip(embeddings).map(|(d, v)| (d.id.clone(), v.clone())).collect();
		let mut guard = self.collections.write().map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
		guard.insert(collection.to_string(), rows);
		Ok(())
	}

	fn search(&self, collection: &str, query_vec: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
		let guard = self.collections.read().map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
		let Some(rows) = guard.get(collection) else { return Ok(Vec::new()) };
		let mut hits: Vec<VectorHit> = rows
			.iter()
			.map(|(id, v)| VectorHit { document_id: id.clone(), distance: cosine_distance(query_vec, v) })
			.collect();
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(limit);
		Ok(hits)
	}

	fn collections(&self) -> Result<Vec<String>> {
		let guard = self.collections.read().map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
		Ok(guard.keys().cloned().collect())
	}

	fn count(&self, collection: &str) -> Result<usize> {
		let guard = self.collections.read().map_err(|_| anyhow::anyhow!("vector store lock poisoned"))?;
		Ok(guard.get(collection).map(Vec::len).unwrap_or(0))
	}
}
