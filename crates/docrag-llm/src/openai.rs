//! OpenAI-compatible `/chat/completions` endpoint.

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use docrag_core::error::Result;
use docrag_core::http::HttpClient;
use docrag_core::traits::Generator;
use docrag_core::types::Prompt;

use crate::{non_empty_answer, Sampling};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiChatGenerator {
    http: HttpClient,
    base_url: String,
    model: String,
    sampling: Sampling,
    api_key: String,
}

impl OpenAiChatGenerator {
    pub fn new(http: HttpClient, base_url: Option<String>, model: String, sampling: Sampling, api_key: String) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()).trim_end_matches('/').to_string();
        Self { http, base_url, model, sampling, api_key }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl Generator for OpenAiChatGenerator {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let req = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "system", content: &prompt.system }, ChatMessage { role: "user", content: &prompt.user }],
            max_tokens: self.sampling.max_tokens,
            temperature: self.sampling.temperature,
        };
        let url = format!("{}/chat/completions", self.base_url);
        let resp: ChatResponse = self.http.send_json("generation", Method::POST, &url, Some(&self.api_key), &req).await?;
        non_empty_answer(resp.choices.into_iter().take(1).filter_map(|c| c.message.content).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrag_core::config::HttpSettings;
    use docrag_core::error::Error;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer) -> OpenAiChatGenerator {
        let http = HttpClient::new(&HttpSettings { timeout_secs: 5, max_retries: 0, backoff_ms: 1 }).expect("client");
        OpenAiChatGenerator::new(http, Some(server.uri()), "gpt-4o-mini".into(), Sampling { max_tokens: 64, temperature: 0.0 }, "sk".into())
    }

    #[tokio::test]
    async fn reads_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": "answer"}}]})))
            .mount(&server)
            .await;

        let prompt = Prompt { system: "s".into(), user: "q".into() };
        assert_eq!(generator(&server).generate(&prompt).await.expect("answer"), "answer");
    }

    #[tokio::test]
    async fn null_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": [{"message": {"content": null}}]})))
            .mount(&server)
            .await;

        let prompt = Prompt { system: "s".into(), user: "q".into() };
        assert!(matches!(generator(&server).generate(&prompt).await, Err(Error::ExternalService { .. })));
    }
}
