//! Vector store backends for document chunks.
//!
//! - `LanceStore`: embedded LanceDB table on local disk (default)
//! - `QdrantStore`: remote Qdrant collection over REST
//! - `MemoryStore`: process-local, nothing persisted

use std::sync::Arc;
use tracing::info;

use docrag_core::config::{expand_path, Settings, VectorBackend};
use docrag_core::error::Result;
use docrag_core::http::HttpClient;
use docrag_core::traits::VectorStore;

pub mod lance;
pub mod memory;
pub mod qdrant;
pub mod schema;
pub mod table;

pub use lance::LanceStore;
pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

/// Open the configured backend, creating its table or collection when missing.
pub async fn open_store(settings: &Settings) -> Result<Arc<dyn VectorStore>> {
    let v = &settings.vector;
    let dim = settings.embedding.dimension;
    let store: Arc<dyn VectorStore> = match v.backend {
        VectorBackend::Lancedb => {
            let dir = expand_path(&v.lancedb_dir);
            Arc::new(LanceStore::open(&dir.to_string_lossy(), &v.table, dim).await?)
        }
        VectorBackend::Qdrant => Arc::new(
            QdrantStore::connect(HttpClient::new(&settings.http)?, &v.qdrant_url, &v.collection, dim, v.qdrant_api_key.clone()).await?,
        ),
        VectorBackend::Memory => Arc::new(MemoryStore::new()),
    };
    info!(backend = store.backend(), dim, "vector store ready");
    Ok(store)
}
