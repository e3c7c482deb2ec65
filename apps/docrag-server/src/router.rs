use serde::{Deserialize, Serialize};
use serde_json::json;
use std::borrow::Cow;
use tracing::{error, warn};

use docrag_core::error::Error;
use docrag_core::types::{Document, DocumentKind};
use docrag_pipeline::Rag;

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// JSON body; `None` for 204.
    pub body: Option<Vec<u8>>,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status: u16, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self { status, body: Some(body) },
            Err(e) => Self::error_body(500, "internal_error", &format!("encode response: {e}")),
        }
    }

    pub fn no_content() -> Self {
        Self { status: 204, body: None }
    }

    pub fn error_body(status: u16, kind: &str, message: &str) -> Self {
        let body = json!({ "error": kind, "message": message }).to_string().into_bytes();
        Self { status, body: Some(body) }
    }

    pub fn from_error(e: &Error) -> Self {
        let status = e.status_code();
        if status >= 500 {
            error!(error = %e, kind = e.kind(), "request failed");
        } else {
            warn!(error = %e, kind = e.kind(), "request rejected");
        }
        Self::error_body(status, e.kind(), &e.to_string())
    }

    pub fn payload_too_large(limit: usize) -> Self {
        Self::error_body(413, "payload_too_large", &format!("request body exceeds {limit} bytes"))
    }

    pub fn body_json(&self) -> serde_json::Value {
        self.body.as_deref().and_then(|b| serde_json::from_slice(b).ok()).unwrap_or(serde_json::Value::Null)
    }
}

impl<T: Serialize> From<Result<T, Error>> for ApiResponse {
    fn from(result: Result<T, Error>) -> Self {
        match result {
            Ok(value) => Self::json(200, &value),
            Err(e) => Self::from_error(&e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IngestRequest {
    #[serde(default)]
    documents: Vec<IngestDocument>,
}

#[derive(Debug, Deserialize)]
struct IngestDocument {
    id: Option<String>,
    text: String,
    filename: Option<String>,
}

impl IngestDocument {
    fn into_document(self) -> Document {
        let id = self.id.filter(|id| !id.trim().is_empty()).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        // text bodies may carry markdown; anything else is taken as plain text
        let kind = match self.filename.as_deref().map(DocumentKind::from_filename) {
            Some(Ok(DocumentKind::Markdown)) => DocumentKind::Markdown,
            _ => DocumentKind::Text,
        };
        let mut doc = Document::text(id, self.text);
        doc.kind = kind;
        doc.filename = self.filename;
        doc
    }
}

#[derive(Debug, Deserialize)]
struct AskRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ReingestRequest {
    #[serde(default)]
    text: String,
}

fn parse_json<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T, Error> {
    serde_json::from_slice(body).map_err(|e| Error::validation(format!("invalid JSON body: {e}")))
}

fn decode_segment(segment: &str) -> Result<Cow<'_, str>, Error> {
    urlencoding::decode(segment).map_err(|e| Error::validation(format!("invalid path segment: {e}")))
}

fn query_param(query: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes()).find(|(k, _)| k == name).map(|(_, v)| v.into_owned())
}

fn method_not_allowed(method: &str, path: &str) -> ApiResponse {
    ApiResponse::error_body(405, "method_not_allowed", &format!("{method} is not supported on {path}"))
}

/// Dispatch one request. `url` is the raw request target, query string included.
pub async fn handle(rag: &Rag, method: &str, url: &str, body: &[u8]) -> ApiResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();

    match (method, segments.as_slice()) {
        ("GET", ["health"]) => ApiResponse::json(200, &json!({ "status": "ok", "backend": rag.store_backend() })),
        (_, ["health"]) => method_not_allowed(method, path),

        ("POST", ["ingest"]) => ingest(rag, body).await,
        (_, ["ingest"]) => method_not_allowed(method, path),

        ("POST", ["upload"]) => upload(rag, query, body).await,
        (_, ["upload"]) => method_not_allowed(method, path),

        ("POST", ["ask"]) => match parse_json::<AskRequest>(body) {
            Ok(req) => rag.ask(&req.query, req.top_k).await.into(),
            Err(e) => ApiResponse::from_error(&e),
        },
        (_, ["ask"]) => method_not_allowed(method, path),

        ("GET", ["documents"]) => rag.list_documents().await.into(),
        (_, ["documents"]) => method_not_allowed(method, path),

        (_, ["documents", id]) => {
            let id = match decode_segment(id) {
                Ok(id) => id,
                Err(e) => return ApiResponse::from_error(&e),
            };
            match method {
                "GET" => rag.document(&id).await.into(),
                "DELETE" => match rag.delete(&id).await {
                    Ok(()) => ApiResponse::no_content(),
                    Err(e) => ApiResponse::from_error(&e),
                },
                _ => method_not_allowed(method, path),
            }
        }

        ("POST", ["documents", id, "reingest"]) => {
            let id = match decode_segment(id) {
                Ok(id) => id,
                Err(e) => return ApiResponse::from_error(&e),
            };
            match parse_json::<ReingestRequest>(body) {
                Ok(req) => rag.reingest(&id, &req.text).await.into(),
                Err(e) => ApiResponse::from_error(&e),
            }
        }
        (_, ["documents", _, "reingest"]) => method_not_allowed(method, path),

        _ => ApiResponse::error_body(404, "not_found", &format!("no route for {method} {path}")),
    }
}

async fn ingest(rag: &Rag, body: &[u8]) -> ApiResponse {
    let req: IngestRequest = match parse_json(body) {
        Ok(req) => req,
        Err(e) => return ApiResponse::from_error(&e),
    };
    if req.documents.is_empty() {
        return ApiResponse::from_error(&Error::validation("documents must not be empty"));
    }
    let docs = req.documents.into_iter().map(IngestDocument::into_document).collect();
    ApiResponse::json(200, &rag.ingest_batch(docs).await)
}

async fn upload(rag: &Rag, query: &str, body: &[u8]) -> ApiResponse {
    let Some(filename) = query_param(query, "filename").filter(|f| !f.trim().is_empty()) else {
        return ApiResponse::from_error(&Error::validation("filename query parameter is required"));
    };
    let kind = match DocumentKind::from_filename(&filename) {
        Ok(kind) => kind,
        Err(e) => return ApiResponse::from_error(&e),
    };
    if body.is_empty() {
        return ApiResponse::from_error(&Error::validation("file body is empty"));
    }
    let id = query_param(query, "id").filter(|id| !id.trim().is_empty()).unwrap_or_else(|| filename.clone());
    rag.ingest(Document::file(id, filename, kind, body.to_vec())).await.into()
}
