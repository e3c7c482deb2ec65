//! In-process store, used by tests and the `memory` backend.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use docrag_core::error::Result;
use docrag_core::traits::VectorStore;
use docrag_core::types::{summarize, ChunkRecord, DocumentSummary, ScoredChunk, StoredChunk};

#[derive(Default)]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<String, Vec<ChunkRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[async_trait]
impl VectorStore for MemoryStore {
    fn backend(&self) -> &str {
        "memory"
    }

    async fn replace_document(&self, doc_id: &str, mut records: Vec<ChunkRecord>) -> Result<()> {
        let mut docs = self.docs.write().await;
        if records.is_empty() {
            docs.remove(doc_id);
        } else {
            records.sort_by_key(|r| r.chunk_index);
            docs.insert(doc_id.to_string(), records);
        }
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        Ok(self.docs.write().await.remove(doc_id).map_or(0, |chunks| chunks.len()))
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let docs = self.docs.read().await;
        let mut hits: Vec<ScoredChunk> = docs
            .values()
            .flatten()
            .map(|r| ScoredChunk {
                doc_id: r.doc_id.clone(),
                chunk_index: r.chunk_index,
                score: cosine_similarity(vector, &r.vector),
                text: r.text.clone(),
            })
            .collect();
        // stable order among equal scores: document then chunk position
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn document_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>> {
        let docs = self.docs.read().await;
        Ok(docs.get(doc_id).map(|chunks| chunks.iter().map(StoredChunk::from).collect()).unwrap_or_default())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let docs = self.docs.read().await;
        let all: Vec<StoredChunk> = docs.values().flatten().map(StoredChunk::from).collect();
        Ok(summarize(&all))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 0.0], &[2.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 3.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), 0.0);
    }
}
