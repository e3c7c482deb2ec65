//! Generation clients that turn a prompt into an answer string.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use docrag_core::config::{GenerationSettings, Provider, Settings};
use docrag_core::error::{Error, Result};
use docrag_core::http::HttpClient;
use docrag_core::traits::Generator;
use docrag_core::types::Prompt;

pub mod bedrock;
pub mod openai;

pub use bedrock::ClaudeGenerator;
pub use openai::OpenAiChatGenerator;

/// Sampling parameters shared by the remote generators.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&GenerationSettings> for Sampling {
    fn from(g: &GenerationSettings) -> Self {
        Self { max_tokens: g.max_tokens, temperature: g.temperature }
    }
}

/// Offline generator that echoes what it was given. Deterministic.
#[derive(Debug, Default)]
pub struct FakeGenerator;

#[async_trait]
impl Generator for FakeGenerator {
    fn model_id(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let preview: String = prompt.user.chars().take(200).collect();
        Ok(format!("[fake answer] {preview}"))
    }
}

pub fn get_default_generator(settings: &Settings) -> Result<Arc<dyn Generator>> {
    let g = &settings.generation;
    let generator: Arc<dyn Generator> = match g.provider {
        Provider::Fake => Arc::new(FakeGenerator),
        Provider::Bedrock => Arc::new(ClaudeGenerator::new(
            HttpClient::new(&settings.http)?,
            settings.bedrock.runtime_endpoint(),
            g.model_id.clone(),
            Sampling::from(g),
            settings.bedrock.api_key.clone(),
        )),
        Provider::Openai => {
            let api_key = g
                .api_key
                .clone()
                .ok_or_else(|| Error::InvalidConfig("generation.api_key is required for the openai provider".into()))?;
            Arc::new(OpenAiChatGenerator::new(HttpClient::new(&settings.http)?, g.base_url.clone(), g.model_id.clone(), Sampling::from(g), api_key))
        }
    };
    info!(model = generator.model_id(), "generation client ready");
    Ok(generator)
}

/// Join text parts and fail when the model produced nothing.
pub(crate) fn non_empty_answer(parts: Vec<String>) -> Result<String> {
    let answer = parts.join("\n").trim().to_string();
    if answer.is_empty() {
        Err(Error::external("generation", "model returned no text"))
    } else {
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_generator_echoes_prompt() {
        let prompt = Prompt { system: "s".into(), user: "質問: RAGとは？".into() };
        let answer = FakeGenerator.generate(&prompt).await.expect("answer");
        assert!(answer.contains("RAGとは？"));
    }

    #[test]
    fn blank_answers_are_errors() {
        assert!(non_empty_answer(vec![" ".into(), String::new()]).is_err());
        assert_eq!(non_empty_answer(vec!["a".into(), "b".into()]).ok().as_deref(), Some("a\nb"));
    }
}
