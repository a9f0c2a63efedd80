//! Query path over one build: nearest-neighbour fetch, de-duplication, then
//! either plain similarity order or MMR selection.
use std::collections::HashSet;
use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, Int32Type};
use arrow_array::{Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use tracing::debug;

use ragpipe_core::traits::{Embedder, VectorSearch};
use ragpipe_core::types::{Chunk, Meta, SearchHit, SearchMode};
use ragpipe_core::{Error, Result};

use crate::mmr::mmr_select;
use crate::schema::{CHUNK_INDEX, CONTENT, DISTANCE, ID, METADATA, VECTOR};
use crate::storage_err;

/// Read handle on the active build. Cheap to clone and safe to share across
/// concurrent queries.
#[derive(Clone)]
pub struct IndexHandle {
	table: Table,
	embedder: Arc<dyn Embedder>,
	build_id: String,
	mmr_lambda: f32,
}

struct Row {
	chunk: Chunk,
	vector: Vec<f32>,
	distance: f32,
}

impl IndexHandle {
	pub(crate) fn new(table: Table, embedder: Arc<dyn Embedder>, build_id: String, mmr_lambda: f32) -> Self {
		Self { table, embedder, build_id, mmr_lambda }
	}

	pub fn build_id(&self) -> &str { &self.build_id }

	pub fn collection(&self) -> &str { self.table.name() }

	pub async fn count(&self) -> Result<usize> { self.table.count_rows(None).await.map_err(storage_err) }

	async fn nearest(&self, query: &[f32], limit: usize) -> Result<Vec<Row>> {
		let mut stream = self
			.table
			.vector_search(query.to_vec())
			.map_err(storage_err)?
			.distance_type(DistanceType::Cosine)
			.limit(limit)
			.execute()
			.await
			.map_err(storage_err)?;
		let mut rows = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(storage_err)? {
			parse_batch(&batch, &mut rows)?;
		}
		rows.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		Ok(rows)
	}
}

#[async_trait]
impl VectorSearch for IndexHandle {
	async fn search(&self, query: &str, k: usize, fetch_k: usize, mode: SearchMode) -> Result<Vec<SearchHit>> {
		if fetch_k < k {
			return Err(Error::InvalidArgument(format!("fetch_k ({fetch_k}) must be at least k ({k})")));
		}
		if k == 0 {
			return Ok(Vec::new());
		}
		let query_vec = self.embedder.embed_query(query).await?;
		let mut seen = HashSet::new();
		let pool: Vec<Row> = self.nearest(&query_vec, fetch_k).await?.into_iter().filter(|r| seen.insert(r.chunk.id.clone())).collect();
		debug!(build = %self.build_id, pool = pool.len(), k, ?mode, "vector search");

		let hit = |row: Row| SearchHit { chunk: row.chunk, score: 1.0 - row.distance };
		let hits = match mode {
			SearchMode::Similarity => pool.into_iter().take(k).map(hit).collect(),
			SearchMode::Diversity => {
				let vectors: Vec<Vec<f32>> = pool.iter().map(|r| r.vector.clone()).collect();
				let order = mmr_select(&query_vec, &vectors, k, self.mmr_lambda);
				let mut slots: Vec<Option<Row>> = pool.into_iter().map(Some).collect();
				order.into_iter().filter_map(|i| slots[i].take()).map(hit).collect()
			}
		};
		Ok(hits)
	}
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Arc<dyn Array>> {
	batch.column_by_name(name).ok_or_else(|| Error::Storage(format!("result batch is missing column '{name}'")))
}

fn strings<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	column(batch, name)?.as_string_opt::<i32>().ok_or_else(|| Error::Storage(format!("column '{name}' is not utf8")))
}

fn parse_batch(batch: &RecordBatch, rows: &mut Vec<Row>) -> Result<()> {
	let ids = strings(batch, ID)?;
	let contents = strings(batch, CONTENT)?;
	let metadata = strings(batch, METADATA)?;
	let indices = column(batch, CHUNK_INDEX)?
		.as_primitive_opt::<Int32Type>()
		.ok_or_else(|| Error::Storage(format!("column '{CHUNK_INDEX}' is not int32")))?;
	let vectors = column(batch, VECTOR)?
		.as_fixed_size_list_opt()
		.ok_or_else(|| Error::Storage(format!("column '{VECTOR}' is not a fixed size list")))?;
	let distances = column(batch, DISTANCE)?
		.as_primitive_opt::<Float32Type>()
		.ok_or_else(|| Error::Storage(format!("column '{DISTANCE}' is not float32")))?;

	for i in 0..batch.num_rows() {
		let meta: Meta = serde_json::from_str(metadata.value(i))
			.map_err(|e| Error::Storage(format!("bad metadata for {}: {e}", ids.value(i))))?;
		let inner = vectors.value(i);
		let vector = inner
			.as_primitive_opt::<Float32Type>()
			.map(|v| v.values().to_vec())
			.ok_or_else(|| Error::Storage("vector items are not float32".into()))?;
		rows.push(Row {
			chunk: Chunk {
				id: ids.value(i).to_string(),
				content: contents.value(i).to_string(),
				metadata: meta,
				chunk_index: usize::try_from(indices.value(i)).unwrap_or_default(),
			},
			vector,
			distance: distances.value(i),
		});
	}
	Ok(())
}
