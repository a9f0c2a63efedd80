use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

pub const ID: &str = "id";
pub const SOURCE: &str = "source";
pub const CONTENT: &str = "content";
pub const CHUNK_INDEX: &str = "chunk_index";
pub const METADATA: &str = "metadata";
pub const VECTOR: &str = "vector";
/// Added by LanceDB to vector search results.
pub const DISTANCE: &str = "_distance";

/// One row per chunk. `metadata` holds the chunk's metadata map as a JSON
/// object; `dim` is fixed per table by the first batch written.
pub fn build_arrow_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new(ID, DataType::Utf8, false),
		Field::new(SOURCE, DataType::Utf8, false),
		Field::new(CONTENT, DataType::Utf8, false),
		Field::new(CHUNK_INDEX, DataType::Int32, false),
		Field::new(METADATA, DataType::Utf8, false),
		Field::new(VECTOR, DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
