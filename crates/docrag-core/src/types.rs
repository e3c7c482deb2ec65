//! Domain types shared by the embedding, vector and generation clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub type DocId = String;

/// Declared source type of an ingested document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    #[default]
    Text,
    Markdown,
    Pdf,
}

impl DocumentKind {
    /// Infer the kind from a file name extension.
    pub fn from_filename(name: &str) -> Result<Self> {
        let ext = name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()).unwrap_or_default();
        match ext.as_str() {
            "txt" => Ok(Self::Text),
            "md" | "markdown" => Ok(Self::Markdown),
            "pdf" => Ok(Self::Pdf),
            _ => Err(Error::validation(format!("unsupported file type: {name}"))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
        }
    }

    /// Parse the label stored in vector payloads; unknown labels fall back to text.
    pub fn from_label(label: &str) -> Self {
        match label {
            "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            _ => Self::Text,
        }
    }
}

/// Raw body of a document before extraction.
#[derive(Debug, Clone)]
pub enum DocumentBody {
    Text(String),
    Bytes(Vec<u8>),
}

/// A document submitted for ingest.
///
/// - `id`: stable document identity, chunks are keyed by it
/// - `filename`: original upload name, kept as metadata
/// - `kind`: how `body` is turned into plain text
#[derive(Debug, Clone)]
pub struct Document {
    pub id: DocId,
    pub filename: Option<String>,
    pub kind: DocumentKind,
    pub body: DocumentBody,
}

impl Document {
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), filename: None, kind: DocumentKind::Text, body: DocumentBody::Text(text.into()) }
    }

    pub fn file(id: impl Into<String>, filename: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self { id: id.into(), filename: Some(filename.into()), kind, body: DocumentBody::Bytes(bytes) }
    }
}

/// One embedded chunk as written to the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub text: String,
    pub filename: Option<String>,
    pub kind: DocumentKind,
    pub ingested_at: DateTime<Utc>,
    pub vector: Vec<f32>,
}

impl ChunkRecord {
    /// Key unique within the store: `{doc_id}:{chunk_index}`.
    pub fn key(&self) -> String {
        chunk_key(&self.doc_id, self.chunk_index)
    }
}

pub fn chunk_key(doc_id: &str, chunk_index: usize) -> String {
    format!("{doc_id}:{chunk_index}")
}

/// A stored chunk without its vector, as returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredChunk {
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub text: String,
    pub filename: Option<String>,
    pub kind: DocumentKind,
    pub ingested_at: DateTime<Utc>,
}

impl From<&ChunkRecord> for StoredChunk {
    fn from(r: &ChunkRecord) -> Self {
        Self {
            doc_id: r.doc_id.clone(),
            chunk_index: r.chunk_index,
            total_chunks: r.total_chunks,
            text: r.text.clone(),
            filename: r.filename.clone(),
            kind: r.kind,
            ingested_at: r.ingested_at,
        }
    }
}

/// A nearest-neighbour hit. `score` is a similarity, higher is better.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub doc_id: DocId,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    pub filename: Option<String>,
    pub kind: DocumentKind,
    pub chunks: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentSummary {
    pub id: DocId,
    pub metadata: DocumentMetadata,
}

/// Group stored chunks by document id, sorted by id.
pub fn summarize(chunks: &[StoredChunk]) -> Vec<DocumentSummary> {
    let mut by_doc: std::collections::BTreeMap<&str, DocumentMetadata> = std::collections::BTreeMap::new();
    for c in chunks {
        let entry = by_doc.entry(c.doc_id.as_str()).or_insert_with(|| DocumentMetadata {
            filename: c.filename.clone(),
            kind: c.kind,
            chunks: 0,
            ingested_at: c.ingested_at,
        });
        entry.chunks += 1;
        if c.ingested_at > entry.ingested_at {
            entry.ingested_at = c.ingested_at;
        }
    }
    by_doc.into_iter().map(|(id, metadata)| DocumentSummary { id: id.to_string(), metadata }).collect()
}

/// Prompt handed to a generation client.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(doc: &str, idx: usize) -> StoredChunk {
        StoredChunk {
            doc_id: doc.to_string(),
            chunk_index: idx,
            total_chunks: 2,
            text: format!("{doc} part {idx}"),
            filename: Some(format!("{doc}.txt")),
            kind: DocumentKind::Text,
            ingested_at: Utc::now(),
        }
    }

    #[test]
    fn kind_from_filename() {
        assert_eq!(DocumentKind::from_filename("a.PDF").ok(), Some(DocumentKind::Pdf));
        assert_eq!(DocumentKind::from_filename("notes.markdown").ok(), Some(DocumentKind::Markdown));
        assert_eq!(DocumentKind::from_filename("x.txt").ok(), Some(DocumentKind::Text));
        assert!(matches!(DocumentKind::from_filename("image.png"), Err(Error::Validation(_))));
        assert!(DocumentKind::from_filename("README").is_err());
    }

    #[test]
    fn summarize_groups_and_sorts() {
        let chunks = vec![stored("b", 0), stored("a", 1), stored("a", 0)];
        let docs = summarize(&chunks);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].metadata.chunks, 2);
        assert_eq!(docs[1].id, "b");
        assert_eq!(docs[1].metadata.filename.as_deref(), Some("b.txt"));
    }
}
