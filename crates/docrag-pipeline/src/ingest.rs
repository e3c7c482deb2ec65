use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use docrag_core::error::{Error, Result};
use docrag_core::extract::{extract_document, sanitize};
use docrag_core::types::{ChunkRecord, Document};

use crate::Rag;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IngestStatus {
    Indexed,
    /// Nothing left after extraction and sanitizing; the store is untouched.
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentStatus {
    pub id: String,
    pub status: IngestStatus,
    pub chunks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngestReport {
    pub indexed_points: usize,
    pub results: Vec<DocumentStatus>,
}

impl Rag {
    /// Extract, chunk, embed and store one document. All-or-nothing: the previous
    /// chunks of `doc.id` are only replaced once every chunk has a vector.
    pub async fn ingest(&self, doc: Document) -> Result<DocumentStatus> {
        if doc.id.trim().is_empty() {
            return Err(Error::validation("document id is required"));
        }
        let id = doc.id.clone();
        match self.ingest_inner(doc).await {
            Ok(status) => Ok(status),
            Err(e) => Err(Error::ingest(id, e)),
        }
    }

    async fn ingest_inner(&self, doc: Document) -> Result<DocumentStatus> {
        let Document { id, filename, kind, body } = doc;
        let text = sanitize(&extract_document(kind, body).await?);
        if text.is_empty() {
            info!(doc_id = %id, "document has no text; skipped");
            return Ok(DocumentStatus { id, status: IngestStatus::Skipped, chunks: 0, error: None });
        }

        let chunks = self.chunker.chunk(&text);
        let vectors = self.embedder.embed_batch(&chunks).await?;
        if vectors.len() != chunks.len() {
            return Err(Error::external(
                self.embedder.embedder_id(),
                format!("expected {} embeddings, got {}", chunks.len(), vectors.len()),
            ));
        }
        let dim = self.embedder.dim();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::external(self.embedder.embedder_id(), format!("dimension mismatch: expected {dim}, got {}", bad.len())));
        }

        let total = chunks.len();
        let now = Utc::now();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (text, vector))| ChunkRecord {
                doc_id: id.clone(),
                chunk_index,
                total_chunks: total,
                text,
                filename: filename.clone(),
                kind,
                ingested_at: now,
                vector,
            })
            .collect();
        self.store.replace_document(&id, records).await?;
        info!(doc_id = %id, chunks = total, backend = self.store.backend(), "document indexed");
        Ok(DocumentStatus { id, status: IngestStatus::Indexed, chunks: total, error: None })
    }

    /// Ingest documents one by one; a failure is recorded and does not stop the batch.
    pub async fn ingest_batch(&self, docs: Vec<Document>) -> IngestReport {
        let mut results = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id.clone();
            match self.ingest(doc).await {
                Ok(status) => results.push(status),
                Err(e) => {
                    warn!(doc_id = %id, error = %e, "ingest failed");
                    results.push(DocumentStatus { id, status: IngestStatus::Failed, chunks: 0, error: Some(e.to_string()) });
                }
            }
        }
        let indexed_points = results.iter().filter(|r| r.status == IngestStatus::Indexed).map(|r| r.chunks).sum();
        IngestReport { indexed_points, results }
    }
}
