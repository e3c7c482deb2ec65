//! Chunk store backed by an embedded LanceDB table.

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use arrow_schema::{DataType, Schema};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use docrag_core::error::{Error, Result};
use docrag_core::traits::VectorStore;
use docrag_core::types::{summarize, ChunkRecord, DocumentKind, DocumentSummary, ScoredChunk, StoredChunk};

use crate::schema::{build_chunk_schema, dim_i32};
use crate::table::{ensure_table, open_db, storage};

pub struct LanceStore {
    db: Connection,
    table_name: String,
    dim: usize,
    schema: Arc<Schema>,
    // one document's replace must not interleave with another writer
    write_lock: Mutex<()>,
}

impl LanceStore {
    pub async fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let db = open_db(uri).await?;
        let schema = build_chunk_schema(dim);
        ensure_table(&db, table_name, schema.clone()).await?;
        let store = Self { db, table_name: table_name.to_string(), dim, schema, write_lock: Mutex::new(()) };
        store.check_dim().await?;
        Ok(store)
    }

    async fn table(&self) -> Result<Table> {
        self.db.open_table(&self.table_name).execute().await.map_err(storage)
    }

    async fn check_dim(&self) -> Result<()> {
        let existing = self.table().await?.schema().await.map_err(storage)?;
        let width = existing.field_with_name("vector").ok().map(|f| f.data_type().clone());
        match width {
            Some(DataType::FixedSizeList(_, n)) if n == dim_i32(self.dim) => Ok(()),
            other => Err(Error::InvalidConfig(format!(
                "table '{}' has vector type {other:?}, expected width {}",
                self.table_name, self.dim
            ))),
        }
    }

    fn to_record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
        for r in records {
            if r.vector.len() != self.dim {
                return Err(Error::Storage(format!("chunk {} has {} dims, expected {}", r.key(), r.vector.len(), self.dim)));
            }
        }
        let keys: Vec<String> = records.iter().map(ChunkRecord::key).collect();
        let doc_ids: Vec<&str> = records.iter().map(|r| r.doc_id.as_str()).collect();
        let indices: Vec<i32> = records.iter().map(|r| to_i32(r.chunk_index)).collect();
        let totals: Vec<i32> = records.iter().map(|r| to_i32(r.total_chunks)).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();
        let filenames: Vec<Option<&str>> = records.iter().map(|r| r.filename.as_deref()).collect();
        let kinds: Vec<&str> = records.iter().map(|r| r.kind.as_str()).collect();
        let stamps: Vec<i64> = records.iter().map(|r| r.ingested_at.timestamp_millis()).collect();
        let vectors = records.iter().map(|r| Some(r.vector.iter().map(|&x| Some(x)).collect::<Vec<_>>()));

        RecordBatch::try_new(
            self.schema.clone(),
            vec![
                Arc::new(StringArray::from(keys)),
                Arc::new(StringArray::from(doc_ids)),
                Arc::new(Int32Array::from(indices)),
                Arc::new(Int32Array::from(totals)),
                Arc::new(StringArray::from(texts)),
                Arc::new(StringArray::from(filenames)),
                Arc::new(StringArray::from(kinds)),
                Arc::new(TimestampMillisecondArray::from(stamps)),
                Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim_i32(self.dim))),
            ],
        )
        .map_err(storage)
    }

    async fn scan(&self, filter: Option<String>) -> Result<Vec<StoredChunk>> {
        let table = self.table().await?;
        let total = table.count_rows(filter.clone()).await.map_err(storage)?;
        if total == 0 {
            return Ok(Vec::new());
        }
        let mut query = table.query().limit(total);
        if let Some(f) = filter {
            query = query.only_if(f);
        }
        let mut stream = query.execute().await.map_err(storage)?;
        let mut out = Vec::with_capacity(total);
        while let Some(batch) = stream.try_next().await.map_err(storage)? {
            out.extend(stored_chunks(&batch)?);
        }
        out.sort_by(|a, b| a.doc_id.cmp(&b.doc_id).then(a.chunk_index.cmp(&b.chunk_index)));
        Ok(out)
    }
}

fn to_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// SQL predicate selecting one document; single quotes are doubled.
pub(crate) fn doc_filter(doc_id: &str) -> String {
    format!("doc_id = '{}'", doc_id.replace('\'', "''"))
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Storage(format!("column '{name}' missing or mistyped")))
}

fn stored_chunks(batch: &RecordBatch) -> Result<Vec<StoredChunk>> {
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let indices = column::<Int32Array>(batch, "chunk_index")?;
    let totals = column::<Int32Array>(batch, "total_chunks")?;
    let texts = column::<StringArray>(batch, "text")?;
    let filenames = column::<StringArray>(batch, "filename")?;
    let kinds = column::<StringArray>(batch, "kind")?;
    let stamps = column::<TimestampMillisecondArray>(batch, "ingested_at")?;

    Ok((0..batch.num_rows())
        .map(|i| StoredChunk {
            doc_id: doc_ids.value(i).to_string(),
            chunk_index: usize::try_from(indices.value(i)).unwrap_or_default(),
            total_chunks: usize::try_from(totals.value(i)).unwrap_or_default(),
            text: texts.value(i).to_string(),
            filename: (!filenames.is_null(i)).then(|| filenames.value(i).to_string()),
            kind: DocumentKind::from_label(kinds.value(i)),
            ingested_at: DateTime::<Utc>::from_timestamp_millis(stamps.value(i)).unwrap_or_default(),
        })
        .collect())
}

#[async_trait]
impl VectorStore for LanceStore {
    fn backend(&self) -> &str {
        "lancedb"
    }

    async fn replace_document(&self, doc_id: &str, records: Vec<ChunkRecord>) -> Result<()> {
        let batch = self.to_record_batch(&records)?;
        let _guard = self.write_lock.lock().await;
        let table = self.table().await?;
        let filter = doc_filter(doc_id);
        if records.is_empty() {
            table.delete(&filter).await.map_err(storage)?;
            return Ok(());
        }
        // Upsert by chunk key and drop the document's other rows in a single commit.
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), self.schema.clone()));
        let mut mi = table.merge_insert(&["key"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all().when_not_matched_by_source_delete(Some(filter));
        let _ = mi.execute(reader).await.map_err(storage)?;
        debug!(doc_id, chunks = records.len(), "replaced document in lancedb");
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        let table = self.table().await?;
        let filter = doc_filter(doc_id);
        let existing = table.count_rows(Some(filter.clone())).await.map_err(storage)?;
        if existing > 0 {
            table.delete(&filter).await.map_err(storage)?;
        }
        Ok(existing)
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let table = self.table().await?;
        if k == 0 || table.count_rows(None).await.map_err(storage)? == 0 {
            return Ok(Vec::new());
        }
        let mut stream = table
            .vector_search(vector.to_vec())
            .map_err(storage)?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(storage)?;

        let mut hits = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(storage)? {
            let doc_ids = column::<StringArray>(&batch, "doc_id")?;
            let indices = column::<Int32Array>(&batch, "chunk_index")?;
            let texts = column::<StringArray>(&batch, "text")?;
            let distances = column::<Float32Array>(&batch, "_distance")?;
            for i in 0..batch.num_rows() {
                hits.push(ScoredChunk {
                    doc_id: doc_ids.value(i).to_string(),
                    chunk_index: usize::try_from(indices.value(i)).unwrap_or_default(),
                    score: 1.0 - distances.value(i),
                    text: texts.value(i).to_string(),
                });
            }
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn document_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>> {
        self.scan(Some(doc_filter(doc_id))).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        Ok(summarize(&self.scan(None).await?))
    }
}
