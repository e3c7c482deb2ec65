//! Amazon Titan Text Embeddings v2 over the Bedrock runtime `InvokeModel` API.
//!
//! Authentication uses a Bedrock API key sent as a bearer token; request
//! signing is left to a fronting proxy when keys are not available.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docrag_core::error::{Error, Result};
use docrag_core::http::HttpClient;
use docrag_core::traits::Embedder;

use crate::check_dim;

/// Stored chunks never exceed this (see `config::validate`); longer questions are cut.
pub use docrag_core::config::BEDROCK_EMBED_MAX_CHARS as MAX_INPUT_CHARS;

pub struct TitanEmbedder {
    http: HttpClient,
    endpoint: String,
    model_id: String,
    dim: usize,
    api_key: Option<String>,
    id: String,
}

impl TitanEmbedder {
    pub fn new(http: HttpClient, endpoint: String, model_id: String, dim: usize, api_key: Option<String>) -> Self {
        let id = format!("bedrock:{model_id}:d{dim}");
        Self { http, endpoint, model_id, dim, api_key, id }
    }

    fn invoke_url(&self) -> String {
        format!("{}/model/{}/invoke", self.endpoint, urlencoding::encode(&self.model_id))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TitanRequest<'a> {
    input_text: &'a str,
    dimensions: usize,
    normalize: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TitanResponse {
    embedding: Option<Vec<f32>>,
    embedding_list: Option<Vec<TitanListItem>>,
    input_text_token_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TitanListItem {
    embedding: Vec<f32>,
}

#[async_trait]
impl Embedder for TitanEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::validation("cannot embed empty text"));
        }
        let input: String;
        let input_text = if text.chars().count() > MAX_INPUT_CHARS {
            debug!(chars = text.chars().count(), "truncating embedding input");
            input = text.chars().take(MAX_INPUT_CHARS).collect();
            input.as_str()
        } else {
            text
        };
        let req = TitanRequest { input_text, dimensions: self.dim, normalize: true };
        let resp: TitanResponse = self.http.send_json("embedding", Method::POST, &self.invoke_url(), self.api_key.as_deref(), &req).await?;
        debug!(tokens = resp.input_text_token_count, "titan embedding");
        let vector = match (resp.embedding, resp.embedding_list) {
            (Some(v), _) => v,
            (None, Some(mut list)) if !list.is_empty() => list.swap_remove(0).embedding,
            _ => return Err(Error::external("embedding", "Titan response carried no embedding")),
        };
        check_dim(self.dim, &vector)?;
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::config::HttpSettings;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder(server: &MockServer, dim: usize) -> TitanEmbedder {
        let http = HttpClient::new(&HttpSettings { timeout_secs: 5, max_retries: 0, backoff_ms: 1 }).expect("client");
        TitanEmbedder::new(http, server.uri(), "amazon.titan-embed-text-v2:0".into(), dim, Some("key".into()))
    }

    #[tokio::test]
    async fn posts_invoke_request_and_reads_embedding() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/model/amazon.titan-embed-text-v2%3A0/invoke"))
            .and(header("authorization", "Bearer key"))
            .and(body_partial_json(json!({"inputText": "RAGとは？", "dimensions": 3, "normalize": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2, 0.3], "inputTextTokenCount": 4})))
            .mount(&server)
            .await;

        let v = embedder(&server, 3).embed("RAGとは？").await.expect("embed");
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn wrong_dimension_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2]})))
            .mount(&server)
            .await;

        let err = embedder(&server, 3).embed("hello").await.expect_err("mismatch");
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn accepts_embedding_list_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddingList": [{"embedding": [1.0, 0.0]}]})))
            .mount(&server)
            .await;

        assert_eq!(embedder(&server, 2).embed("x").await.expect("embed"), vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn empty_text_fails_validation_without_calling_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        assert!(matches!(embedder(&server, 3).embed("   ").await, Err(Error::Validation(_))));
    }
}
