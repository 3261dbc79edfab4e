//! LanceDB connection and table helpers shared by the store.
use anyhow::Result;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray};
use lancedb::{connect, Connection};
use recall_core::types::Document;
use std::sync::Arc;

use crate::schema::build_document_schema;

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Arrow batch for `docs` paired row-for-row with `vectors`.
pub fn documents_to_record_batch(docs: &[Document], vectors: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	anyhow::ensure!(docs.len() == vectors.len(), "documents and embeddings length must match ({} vs {})", docs.len(), vectors.len());
	if let Some(bad) = vectors.iter().find(|v| v.len() != dim as usize) {
		anyhow::bail!("embedding has dim {} but the table expects {}", bad.len(), dim);
	}
	let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
	let kinds: Vec<&str> = docs.iter().map(|d| d.kind.as_str()).collect();
	let titles: Vec<Option<&str>> = docs.iter().map(|d| d.title.as_deref()).collect();
	let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
	let tags: Vec<String> = docs.iter().map(|d| d.tags.iter().cloned().collect::<Vec<_>>().join(",")).collect();
	let timestamps: Vec<&str> = docs.iter().map(|d| d.timestamp.as_str()).collect();
	let vectors = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));

	let batch = RecordBatch::try_new(build_document_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(kinds)),
		Arc::new(StringArray::from(titles)),
		Arc::new(StringArray::from(texts)),
		Arc::new(StringArray::from(tags)),
		Arc::new(StringArray::from(timestamps)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
	])?;
	Ok(batch)
}
