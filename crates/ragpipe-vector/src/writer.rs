use std::sync::Arc;

use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use tracing::info;

use ragpipe_core::types::Chunk;
use ragpipe_core::{Error, Result};

use crate::schema::{build_arrow_schema, ID};
use crate::storage_err;
use crate::table::table_exists;

const BATCH_SIZE: usize = 1000;

/// Writes `chunks` with their `vectors` (same order) into `table_name` as a
/// single commit. A new table is created from the rows; an existing one is
/// upserted on `id`, so re-writing a chunk replaces its row.
pub(crate) async fn write_rows(conn: &Connection, table_name: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
	if chunks.len() != vectors.len() {
		return Err(Error::index_build(format!("{} chunks but {} embeddings", chunks.len(), vectors.len())));
	}
	let Some(dim) = vectors.first().map(Vec::len) else { return Ok(()) };
	if dim == 0 || vectors.iter().any(|v| v.len() != dim) {
		return Err(Error::index_build(format!("embeddings must share one non-zero width (first is {dim})")));
	}

	info!(table = table_name, rows = chunks.len(), dim, "writing rows");
	let pb = ProgressBar::new(chunks.len() as u64);
	pb.set_style(
		ProgressStyle::default_bar()
			.template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")
			.unwrap_or_else(|_| ProgressStyle::default_bar())
			.progress_chars("#>-"),
	);
	let mut batches = Vec::with_capacity(chunks.len().div_ceil(BATCH_SIZE));
	for (chunk_batch, vector_batch) in chunks.chunks(BATCH_SIZE).zip(vectors.chunks(BATCH_SIZE)) {
		batches.push(to_record_batch(chunk_batch, vector_batch, dim as i32)?);
		pb.inc(chunk_batch.len() as u64);
	}
	pb.finish_and_clear();

	let reader = Box::new(RecordBatchIterator::new(batches.into_iter().map(Ok), build_arrow_schema(dim as i32)));
	if table_exists(conn, table_name).await? {
		let table = conn.open_table(table_name).execute().await.map_err(storage_err)?;
		let mut upsert = table.merge_insert(&[ID]);
		upsert.when_matched_update_all(None).when_not_matched_insert_all();
		upsert.execute(reader).await.map_err(storage_err)?;
	} else {
		conn.create_table(table_name, reader).execute().await.map_err(storage_err)?;
	}
	Ok(())
}

fn to_record_batch(chunks: &[Chunk], vectors: &[Vec<f32>], dim: i32) -> Result<RecordBatch> {
	let mut ids = Vec::with_capacity(chunks.len());
	let mut sources = Vec::with_capacity(chunks.len());
	let mut contents = Vec::with_capacity(chunks.len());
	let mut chunk_indices = Vec::with_capacity(chunks.len());
	let mut metadata = Vec::with_capacity(chunks.len());
	for chunk in chunks {
		ids.push(chunk.id.clone());
		sources.push(chunk.source().unwrap_or_default().to_string());
		contents.push(chunk.content.clone());
		chunk_indices.push(i32::try_from(chunk.chunk_index).map_err(|_| Error::index_build(format!("chunk_index overflow for {}", chunk.id)))?);
		metadata.push(serde_json::to_string(&chunk.metadata).map_err(|e| Error::index_build(format!("metadata for {}: {e}", chunk.id)))?);
	}
	let vectors = vectors.iter().map(|v| Some(v.iter().map(|&x| Some(x)).collect::<Vec<_>>()));
	RecordBatch::try_new(build_arrow_schema(dim), vec![
		Arc::new(StringArray::from(ids)),
		Arc::new(StringArray::from(sources)),
		Arc::new(StringArray::from(contents)),
		Arc::new(Int32Array::from(chunk_indices)),
		Arc::new(StringArray::from(metadata)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
	])
	.map_err(storage_err)
}

#[cfg(test)]
mod tests {
	use super::*;
	use ragpipe_core::types::Meta;

	fn chunk(i: usize) -> Chunk {
		let mut metadata = Meta::new();
		metadata.insert("source".into(), "a.md".into());
		Chunk { id: format!("a.md:{i}"), content: format!("text {i}"), metadata, chunk_index: i }
	}

	#[test]
	fn record_batch_has_one_row_per_chunk() {
		let batch = to_record_batch(&[chunk(0), chunk(1)], &[vec![1.0, 0.0], vec![0.0, 1.0]], 2).unwrap();
		assert_eq!(batch.num_rows(), 2);
		assert_eq!(batch.num_columns(), 6);
	}

	#[tokio::test]
	async fn mismatched_widths_are_rejected() {
		let tmp = tempfile::tempdir().unwrap();
		let conn = crate::table::open_db(tmp.path()).await.unwrap();
		let err = write_rows(&conn, "t", &[chunk(0), chunk(1)], &[vec![1.0, 0.0], vec![1.0]]).await.unwrap_err();
		assert!(matches!(err, Error::IndexBuild { .. }));
	}

	#[tokio::test]
	async fn rewriting_ids_replaces_rows() {
		let tmp = tempfile::tempdir().unwrap();
		let conn = crate::table::open_db(tmp.path()).await.unwrap();
		let vectors = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
		write_rows(&conn, "t", &[chunk(0), chunk(1)], &vectors).await.unwrap();
		write_rows(&conn, "t", &[chunk(1), chunk(2)], &vectors).await.unwrap();
		let table = conn.open_table("t").execute().await.unwrap();
		assert_eq!(table.count_rows(None).await.unwrap(), 3);
	}

	#[tokio::test]
	async fn rows_beyond_one_batch_land_together() {
		let tmp = tempfile::tempdir().unwrap();
		let conn = crate::table::open_db(tmp.path()).await.unwrap();
		let chunks: Vec<Chunk> = (0..BATCH_SIZE + 5).map(chunk).collect();
		let vectors = vec![vec![0.5, 0.5]; chunks.len()];
		write_rows(&conn, "t", &chunks, &vectors).await.unwrap();
		let table = conn.open_table("t").execute().await.unwrap();
		assert_eq!(table.count_rows(None).await.unwrap(), BATCH_SIZE + 5);
	}
}
