//! Chunk store backed by a Qdrant collection over its REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use docrag_core::error::{Error, Result};
use docrag_core::http::HttpClient;
use docrag_core::traits::VectorStore;
use docrag_core::types::{summarize, ChunkRecord, DocumentKind, DocumentSummary, ScoredChunk, StoredChunk};

const SERVICE: &str = "qdrant";
const SCROLL_PAGE: usize = 256;

pub struct QdrantStore {
    http: HttpClient,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

/// Payload stored next to each point.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Payload {
    doc_id: String,
    #[serde(default)]
    chunk_index: usize,
    #[serde(default)]
    total_chunks: usize,
    text: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    kind: DocumentKind,
    #[serde(default)]
    ingested_at: DateTime<Utc>,
}

impl From<&ChunkRecord> for Payload {
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

impl From<Payload> for StoredChunk {
    fn from(p: Payload) -> Self {
        Self {
            doc_id: p.doc_id,
            chunk_index: p.chunk_index,
            total_chunks: p.total_chunks,
            text: p.text,
            filename: p.filename,
            kind: p.kind,
            ingested_at: p.ingested_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: usize,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct ScrollResult {
    points: Vec<ScrolledPoint>,
    next_page_offset: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ScrolledPoint {
    payload: Option<Payload>,
}

/// Deterministic point id for a chunk key; Qdrant only accepts integers or UUIDs.
pub fn point_id(key: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
}

fn doc_filter(doc_id: &str) -> Value {
    json!({ "must": [{ "key": "doc_id", "match": { "value": doc_id } }] })
}

/// Points of `doc_id` other than `keep`.
fn stale_filter(doc_id: &str, keep: &[Uuid]) -> Value {
    let mut filter = doc_filter(doc_id);
    filter["must_not"] = json!([{ "has_id": keep }]);
    filter
}

impl QdrantStore {
    /// Connect and create the collection (cosine distance) when it does not exist.
    pub async fn connect(http: HttpClient, base_url: &str, collection: &str, dim: usize, api_key: Option<String>) -> Result<Self> {
        let store = Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
        };
        store.ensure_collection(dim).await?;
        Ok(store)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{}", self.base_url, self.collection, suffix)
    }

    async fn call<R: DeserializeOwned>(&self, method: Method, suffix: &str, body: &Value) -> Result<R> {
        let env: Envelope<R> = self.http.send_json(SERVICE, method, &self.url(suffix), self.api_key.as_deref(), body).await?;
        Ok(env.result)
    }

    async fn ensure_collection(&self, dim: usize) -> Result<()> {
        let existing: Option<Envelope<Value>> =
            self.http.send_json_optional::<Value, _>(SERVICE, Method::GET, &self.url(""), self.api_key.as_deref(), None).await?;
        if let Some(env) = existing {
            let size = env.result.pointer("/config/params/vectors/size").and_then(Value::as_u64);
            if let Some(size) = size {
                if usize::try_from(size).ok() != Some(dim) {
                    return Err(Error::InvalidConfig(format!(
                        "collection '{}' has vector size {size}, expected {dim}",
                        self.collection
                    )));
                }
            }
            return Ok(());
        }
        let _: Value = self.call(Method::PUT, "", &json!({ "vectors": { "size": dim, "distance": "Cosine" } })).await?;
        info!(collection = %self.collection, dim, "created qdrant collection");
        Ok(())
    }

    async fn count(&self, filter: Option<Value>) -> Result<usize> {
        let mut body = json!({ "exact": true });
        if let Some(f) = filter {
            body["filter"] = f;
        }
        let res: CountResult = self.call(Method::POST, "/points/count", &body).await?;
        Ok(res.count)
    }

    async fn delete_by_doc(&self, doc_id: &str) -> Result<()> {
        let _: Value = self.call(Method::POST, "/points/delete?wait=true", &json!({ "filter": doc_filter(doc_id) })).await?;
        Ok(())
    }

    async fn scroll(&self, filter: Option<Value>) -> Result<Vec<StoredChunk>> {
        let mut out = Vec::new();
        let mut offset: Option<Value> = None;
        loop {
            let mut body = json!({ "limit": SCROLL_PAGE, "with_payload": true, "with_vector": false });
            if let Some(f) = &filter {
                body["filter"] = f.clone();
            }
            if let Some(o) = offset.take() {
                body["offset"] = o;
            }
            let page: ScrollResult = self.call(Method::POST, "/points/scroll", &body).await?;
            out.extend(page.points.into_iter().filter_map(|p| p.payload).map(StoredChunk::from));
            match page.next_page_offset {
                Some(next) if !next.is_null() => offset = Some(next),
                _ => break,
            }
        }
        out.sort_by(|a, b| a.doc_id.cmp(&b.doc_id).then(a.chunk_index.cmp(&b.chunk_index)));
        Ok(out)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &str {
        "qdrant"
    }

    async fn replace_document(&self, doc_id: &str, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return self.delete_by_doc(doc_id).await;
        }
        let ids: Vec<Uuid> = records.iter().map(|r| point_id(&r.key())).collect();
        let points: Vec<Value> = records
            .iter()
            .zip(&ids)
            .map(|(r, id)| json!({ "id": id, "vector": r.vector, "payload": Payload::from(r) }))
            .collect();
        // One batch request: new points first, then whatever the document had beyond them.
        let body = json!({
            "operations": [
                { "upsert": { "points": points } },
                { "delete": { "filter": stale_filter(doc_id, &ids) } },
            ]
        });
        let _: Value = self.call(Method::POST, "/points/batch?wait=true", &body).await?;
        debug!(doc_id, chunks = records.len(), "replaced document in qdrant");
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<usize> {
        let existing = self.count(Some(doc_filter(doc_id))).await?;
        if existing > 0 {
            self.delete_by_doc(doc_id).await?;
        }
        Ok(existing)
    }

    async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let body = json!({ "vector": vector, "limit": k, "with_payload": true });
        let points: Vec<ScoredPoint> = self.call(Method::POST, "/points/search", &body).await?;
        Ok(points
            .into_iter()
            .filter_map(|p| {
                p.payload.map(|pl| ScoredChunk { doc_id: pl.doc_id, chunk_index: pl.chunk_index, score: p.score, text: pl.text })
            })
            .collect())
    }

    async fn document_chunks(&self, doc_id: &str) -> Result<Vec<StoredChunk>> {
        self.scroll(Some(doc_filter(doc_id))).await
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        Ok(summarize(&self.scroll(None).await?))
    }
}
