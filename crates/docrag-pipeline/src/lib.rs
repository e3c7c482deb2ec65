//! Ingest and query orchestration over pluggable embedding, vector and generation clients.

use std::sync::Arc;

use docrag_core::chunker::Chunker;
use docrag_core::config::{QuerySettings, Settings};
use docrag_core::error::{Error, Result};
use docrag_core::traits::{Embedder, Generator, VectorStore};

pub mod ingest;
pub mod prompt;
pub mod query;
pub mod registry;

pub use ingest::{DocumentStatus, IngestReport, IngestStatus};
pub use query::{Answer, Context};
pub use registry::{ChunkText, DocumentDetail};

/// Holds no durable state; everything persistent lives in the vector store.
pub struct Rag {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn Generator>,
    chunker: Chunker,
    query: QuerySettings,
    system_prompt: String,
}

impl Rag {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn Generator>,
        settings: &Settings,
    ) -> Result<Self> {
        if embedder.dim() != settings.embedding.dimension {
            return Err(Error::InvalidConfig(format!(
                "embedder '{}' produces {} dims but embedding.dimension is {}",
                embedder.embedder_id(),
                embedder.dim(),
                settings.embedding.dimension
            )));
        }
        Ok(Self {
            embedder,
            store,
            generator,
            chunker: Chunker::new(settings.chunking.clone())?,
            query: settings.query.clone(),
            system_prompt: settings.generation.system_prompt.clone().unwrap_or_else(|| prompt::DEFAULT_SYSTEM_PROMPT.to_string()),
        })
    }

    /// Build every client from configuration.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = docrag_embed::get_default_embedder(settings)?;
        let generator = docrag_llm::get_default_generator(settings)?;
        let store = docrag_vector::open_store(settings).await?;
        Self::new(embedder, store, generator, settings)
    }

    pub fn store_backend(&self) -> &str {
        self.store.backend()
    }
}
