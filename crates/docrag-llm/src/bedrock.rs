//! Anthropic Claude models through the Bedrock runtime `InvokeModel` API.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docrag_core::error::Result;
use docrag_core::http::HttpClient;
use docrag_core::traits::Generator;
use docrag_core::types::Prompt;

use crate::{non_empty_answer, Sampling};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

pub struct ClaudeGenerator {
    http: HttpClient,
    endpoint: String,
    model_id: String,
    sampling: Sampling,
    api_key: Option<String>,
}

impl ClaudeGenerator {
    pub fn new(http: HttpClient, endpoint: String, model_id: String, sampling: Sampling, api_key: Option<String>) -> Self {
        Self { http, endpoint, model_id, sampling, api_key }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    anthropic_version: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: Vec<ContentBlock<'a>>,
}

#[derive(Debug, Serialize)]
struct ContentBlock<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[async_trait]
impl Generator for ClaudeGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let req = MessagesRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
            system: &prompt.system,
            messages: vec![Message { role: "user", content: vec![ContentBlock { kind: "text", text: &prompt.user }] }],
        };
        let url = format!("{}/model/{}/invoke", self.endpoint, urlencoding::encode(&self.model_id));
        let resp: MessagesResponse = self.http.send_json("generation", Method::POST, &url, self.api_key.as_deref(), &req).await?;
        debug!(stop_reason = ?resp.stop_reason, blocks = resp.content.len(), "claude response");
        non_empty_answer(resp.content.into_iter().filter(|b| b.kind == "text").map(|b| b.text).collect())
    }
}
