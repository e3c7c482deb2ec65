use serde::Serialize;
use tracing::info;

use docrag_core::error::{Error, Result};
use docrag_core::extract::sanitize;
use docrag_core::types::{summarize, Document, DocumentBody, DocumentKind, DocumentMetadata, DocumentSummary};

use crate::ingest::DocumentStatus;
use crate::Rag;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChunkText {
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentDetail {
    pub id: String,
    pub metadata: DocumentMetadata,
    pub chunks: Vec<ChunkText>,
}

fn missing(id: &str) -> Error {
    Error::not_found(format!("document '{id}'"))
}

impl Rag {
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        self.store.list_documents().await
    }

    pub async fn document(&self, id: &str) -> Result<DocumentDetail> {
        let chunks = self.store.document_chunks(id).await?;
        let summary = summarize(&chunks).into_iter().next().ok_or_else(|| missing(id))?;
        Ok(DocumentDetail {
            id: summary.id,
            metadata: summary.metadata,
            chunks: chunks.into_iter().map(|c| ChunkText { chunk_index: c.chunk_index, text: c.text }).collect(),
        })
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let removed = self.store.delete_document(id).await?;
        if removed == 0 {
            return Err(missing(id));
        }
        info!(doc_id = id, chunks = removed, "document deleted");
        Ok(())
    }

    /// Replace an existing document's content with new text, keeping its filename.
    pub async fn reingest(&self, id: &str, text: &str) -> Result<DocumentStatus> {
        if sanitize(text).is_empty() {
            return Err(Error::validation("text is required"));
        }
        let existing = self.store.document_chunks(id).await?;
        let first = existing.first().ok_or_else(|| missing(id))?;
        let doc = Document {
            id: id.to_string(),
            filename: first.filename.clone(),
            kind: DocumentKind::Text,
            body: DocumentBody::Text(text.to_string()),
        };
        self.ingest(doc).await
    }
}
