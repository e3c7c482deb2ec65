//! OpenAI-compatible `/embeddings` endpoint (OpenAI, vLLM, Ollama, LiteLLM...).

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use docrag_core::error::{Error, Result};
use docrag_core::http::HttpClient;
use docrag_core::traits::Embedder;

use crate::check_dim;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// OpenAI accepts at most 2048 inputs per request.
const MAX_BATCH_SIZE: usize = 2048;

pub struct OpenAiEmbedder {
    http: HttpClient,
    base_url: String,
    model: String,
    dim: usize,
    api_key: String,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(http: HttpClient, base_url: Option<String>, model: String, dim: usize, api_key: String) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()).trim_end_matches('/').to_string();
        let id = format!("openai:{model}:d{dim}");
        Self { http, base_url, model, dim, api_key, id }
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let req = EmbeddingRequest { model: &self.model, input: texts, dimensions: Some(self.dim), encoding_format: "float" };
        let url = format!("{}/embeddings", self.base_url);
        let resp: EmbeddingResponse = self.http.send_json("embedding", Method::POST, &url, Some(&self.api_key), &req).await?;
        if resp.data.len() != texts.len() {
            return Err(Error::external("embedding", format!("expected {} embeddings, got {}", texts.len(), resp.data.len())));
        }
        let mut data = resp.data;
        data.sort_by_key(|d| d.index);
        let vectors: Vec<Vec<f32>> = data.into_iter().map(|d| d.embedding).collect();
        for v in &vectors {
            check_dim(self.dim, v)?;
        }
        Ok(vectors)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut out = self.embed_batch(&[text.to_string()]).await?;
        out.pop().ok_or_else(|| Error::external("embedding", "empty embedding response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.iter().any(|t| t.trim().is_empty()) {
            return Err(Error::validation("cannot embed empty text"));
        }
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_BATCH_SIZE) {
            out.extend(self.embed_chunk(chunk).await?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::config::HttpSettings;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn batch_results_are_ordered_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "text-embedding-3-small", "input": ["a", "b"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"embedding": [0.0, 1.0], "index": 1},
                    {"embedding": [1.0, 0.0], "index": 0}
                ]
            })))
            .mount(&server)
            .await;

        let http = HttpClient::new(&HttpSettings { timeout_secs: 5, max_retries: 0, backoff_ms: 1 }).expect("client");
        let embedder = OpenAiEmbedder::new(http, Some(format!("{}/v1/", server.uri())), "text-embedding-3-small".into(), 2, "sk-test".into());
        let out = embedder.embed_batch(&["a".to_string(), "b".to_string()]).await.expect("embed");
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }
}
