use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChunkRecord, DocumentSummary, Prompt, ScoredChunk, StoredChunk};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g., `bedrock:amazon.titan-embed-text-v2:0`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn backend(&self) -> &str;

    /// Delete every chunk of `doc_id`, then insert `records`.
    async fn replace_document(&self, doc_id: &str, records: Vec<ChunkRecord>) -> Result<()>;

    /// Remove all chunks of `doc_id`; returns how many were removed.
    async fn delete_document(&self, doc_id: &str) -> Result<usize>;

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>>;

    /// Chunks of one document, ordered by chunk index. Empty when unknown.
    async fn document_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>>;

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;
}

#[async_trait]
pub trait Generator: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}
