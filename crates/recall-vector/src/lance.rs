use anyhow::{anyhow, Context, Result};
use arrow_array::{Array, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::database::CreateTableMode;
use lancedb::{Connection, DistanceType};
use recall_core::traits::VectorStore;
use recall_core::types::{Document, VectorHit};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::schema::{build_document_schema, vector_dim};
use crate::table::{documents_to_record_batch, open_db, table_exists};

const WRITE_BATCH_ROWS: usize = 1000;

/// LanceDB-backed store: one table per collection under a local directory.
///
/// The `VectorStore` seam is synchronous, so the store owns a runtime and
/// blocks on the async client inside each call.
pub struct LanceVectorStore {
	db: Connection,
	runtime: Runtime,
	path: PathBuf,
	dim: i32,
}

impl LanceVectorStore {
	pub fn open(path: &Path, dim: usize) -> Result<Self> {
		std::fs::create_dir_all(path).with_context(|| format!("creating {}", path.display()))?;
		let runtime = Runtime::new().context("starting LanceDB runtime")?;
		let uri = path.to_string_lossy().to_string();
		let db = runtime.block_on(open_db(&uri)).with_context(|| format!("opening LanceDB at {uri}"))?;
		let dim = i32::try_from(dim).context("embedding dim out of range")?;
		tracing::debug!(path = %path.display(), dim, "opened LanceDB");
		Ok(Self { db, runtime, path: path.to_path_buf(), dim })
	}

	pub fn path(&self) -> &Path { &self.path }

	async fn replace_async(&self, collection: &str, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
		anyhow::ensure!(documents.len() == embeddings.len(), "documents and embeddings length must match ({} vs {})", documents.len(), embeddings.len());
		let schema = build_document_schema(self.dim);
		let mut batches: Vec<std::result::Result<RecordBatch, arrow_schema::ArrowError>> = Vec::new();
		for (docs, vecs) in documents.chunks(WRITE_BATCH_ROWS).zip(embeddings.chunks(WRITE_BATCH_ROWS)) {
			batches.push(Ok(documents_to_record_batch(docs, vecs, self.dim)?));
		}
		let reader = Box::new(RecordBatchIterator::new(batches.into_iter(), schema));

		if table_exists(&self.db, collection).await? {
			let table = self.db.open_table(collection).execute().await?;
			let existing = vector_dim(table.schema().await?.as_ref());
			if existing != Some(self.dim) {
				return Err(anyhow!(
					"table '{}' stores vectors of dim {:?} but the embedder produces {}; remove {} and re-index",
					collection, existing, self.dim, self.path.display()
				));
			}
		}
		// Single commit; the previous version stays current if the write fails.
		self.db.create_table(collection, reader).mode(CreateTableMode::Overwrite).execute().await?;
		tracing::info!(collection, rows = documents.len(), "replaced LanceDB table");
		Ok(())
	}

	async fn search_async(&self, collection: &str, query_vec: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
		if limit == 0 || !table_exists(&self.db, collection).await? {
			return Ok(Vec::new());
		}
		let table = self.db.open_table(collection).execute().await?;
		let mut stream = table
			.vector_search(query_vec.to_vec())?
			.distance_type(DistanceType::Cosine)
			.limit(limit)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let ids = batch
				.column_by_name("id")
				.and_then(|c| c.as_any().downcast_ref::<StringArray>())
				.ok_or_else(|| anyhow!("id column missing from search result"))?;
			let distances = batch
				.column_by_name("_distance")
				.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
				.ok_or_else(|| anyhow!("_distance column missing from search result"))?;
			for i in 0..batch.num_rows() {
				let distance = if distances.is_null(i) { f64::NAN } else { distances.value(i) as f64 };
				hits.push(VectorHit { document_id: ids.value(i).to_string(), distance });
			}
		}
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(limit);
		Ok(hits)
	}
}

impl VectorStore for LanceVectorStore {
	fn replace(&self, collection: &str, documents: &[Document], embeddings: &[Vec<f32>]) -> Result<()> {
		self.runtime.block_on(self.replace_async(collection, documents, embeddings))
	}

	fn search(&self, collection: &str, query_vec: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
		self.runtime.block_on(self.search_async(collection, query_vec, limit))
	}

	fn collections(&self) -> Result<Vec<String>> {
		self.runtime.block_on(async { Ok(self.db.table_names().execute().await?) })
	}

	fn count(&self, collection: &str) -> Result<usize> {
		self.runtime.block_on(async {
			if !table_exists(&self.db, collection).await? {
				return Ok(0);
			}
			let table = self.db.open_table(collection).execute().await?;
			Ok(table.count_rows(None).await?)
		})
	}
}
