use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Arrow schema of the chunk table. `dim` is the embedding width.
pub fn build_chunk_schema(dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("key", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("total_chunks", DataType::Int32, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("filename", DataType::Utf8, true),
        Field::new("kind", DataType::Utf8, false),
        Field::new("ingested_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim_i32(dim)), true),
    ]))
}

pub(crate) fn dim_i32(dim: usize) -> i32 {
    i32::try_from(dim).unwrap_or(i32::MAX)
}
