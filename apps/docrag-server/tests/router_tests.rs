use serde_json::{json, Value};
use std::sync::Arc;

use docrag_core::config::Settings;
use docrag_embed::FakeEmbedder;
use docrag_llm::FakeGenerator;
use docrag_pipeline::Rag;
use docrag_server::handle;
use docrag_vector::MemoryStore;

fn rag() -> Rag {
    let mut s = Settings::default();
    s.embedding.dimension = 32;
    Rag::new(Arc::new(FakeEmbedder::new(32)), Arc::new(MemoryStore::new()), Arc::new(FakeGenerator), &s).expect("rag")
}

fn body(v: Value) -> Vec<u8> {
    v.to_string().into_bytes()
}

#[tokio::test]
async fn health_reports_backend() {
    let res = handle(&rag(), "GET", "/health", b"").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_json(), json!({"status": "ok", "backend": "memory"}));
}

#[tokio::test]
async fn ingest_ask_list_delete_flow() {
    let rag = rag();
    let res = handle(
        &rag,
        "POST",
        "/ingest",
        &body(json!({"documents": [
            {"id": "doc-1", "text": "東京は日本の首都です。人口が多い都市です。", "filename": "tokyo.txt"},
            {"text": "IDなしの文書"}
        ]})),
    )
    .await;
    assert_eq!(res.status, 200);
    let report = res.body_json();
    assert_eq!(report["results"][0]["status"], "indexed");
    assert_eq!(report["results"][1]["status"], "indexed");
    assert_eq!(report["results"][1]["id"].as_str().map(str::len), Some(36));
    assert!(report["indexed_points"].as_u64().unwrap_or_default() >= 2);

    let res = handle(&rag, "POST", "/ask", &body(json!({"query": "日本の首都は？", "top_k": 2}))).await;
    assert_eq!(res.status, 200);
    let answer = res.body_json();
    assert!(!answer["answer"].as_str().unwrap_or_default().is_empty());
    assert_eq!(answer["context_found"], true);
    assert!(answer["contexts"].as_array().map(Vec::len).unwrap_or_default() <= 2);

    let res = handle(&rag, "GET", "/documents", b"").await;
    assert_eq!(res.status, 200);
    let docs = res.body_json();
    assert_eq!(docs.as_array().map(Vec::len), Some(2));
    let tokyo = docs.as_array().and_then(|d| d.iter().find(|d| d["id"] == "doc-1")).cloned().unwrap_or_default();
    assert_eq!(tokyo["metadata"]["filename"], "tokyo.txt");

    let res = handle(&rag, "GET", "/documents/doc-1", b"").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_json()["chunks"][0]["chunk_index"], 0);

    let res = handle(&rag, "DELETE", "/documents/doc-1", b"").await;
    assert_eq!(res.status, 204);
    assert!(res.body.is_none());

    let res = handle(&rag, "DELETE", "/documents/doc-1", b"").await;
    assert_eq!(res.status, 404);
    assert_eq!(res.body_json()["error"], "not_found");
}

#[tokio::test]
async fn reingest_status_codes() {
    let rag = rag();
    handle(&rag, "POST", "/ingest", &body(json!({"documents": [{"id": "a b", "text": "元の本文"}]}))).await;

    let res = handle(&rag, "POST", "/documents/a%20b/reingest", &body(json!({"text": "新しい本文"}))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_json()["status"], "indexed");

    let res = handle(&rag, "POST", "/documents/a%20b/reingest", &body(json!({"text": ""}))).await;
    assert_eq!(res.status, 400);
    assert_eq!(res.body_json()["error"], "validation_error");

    let res = handle(&rag, "POST", "/documents/missing/reingest", &body(json!({"text": "x"}))).await;
    assert_eq!(res.status, 404);
}

#[tokio::test]
async fn upload_infers_kind_from_filename() {
    let rag = rag();
    let res = handle(&rag, "POST", "/upload?filename=notes.md", b"# Heading\n\nSome *markdown* text.").await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_json()["id"], "notes.md");

    let docs = handle(&rag, "GET", "/documents", b"").await.body_json();
    assert_eq!(docs[0]["metadata"]["kind"], "markdown");

    let res = handle(&rag, "POST", "/upload?filename=image.png", b"\x89PNG").await;
    assert_eq!(res.status, 400);
    let res = handle(&rag, "POST", "/upload", b"text").await;
    assert_eq!(res.status, 400);
    let res = handle(&rag, "POST", "/upload?filename=a.txt&id=custom", b"hello").await;
    assert_eq!(res.body_json()["id"], "custom");
}

#[tokio::test]
async fn bad_requests_are_rejected() {
    let rag = rag();
    assert_eq!(handle(&rag, "POST", "/ask", b"{not json").await.status, 400);
    assert_eq!(handle(&rag, "POST", "/ask", &body(json!({"query": ""}))).await.status, 400);
    assert_eq!(handle(&rag, "POST", "/ask", &body(json!({"query": "q", "top_k": 100}))).await.status, 400);
    assert_eq!(handle(&rag, "POST", "/ingest", &body(json!({"documents": []}))).await.status, 400);
    assert_eq!(handle(&rag, "GET", "/ask", b"").await.status, 405);
    assert_eq!(handle(&rag, "GET", "/nowhere", b"").await.status, 404);
}

#[tokio::test]
async fn ask_on_empty_store_still_answers() {
    let res = handle(&rag(), "POST", "/ask", &body(json!({"query": "何か？"}))).await;
    assert_eq!(res.status, 200);
    assert_eq!(res.body_json()["context_found"], false);
}
