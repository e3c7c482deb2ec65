//! Embedding clients: Amazon Bedrock (Titan), OpenAI-compatible endpoints,
//! and a deterministic offline embedder for tests and local development.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tracing::info;
use twox_hash::XxHash64;

use docrag_core::config::{Provider, Settings};
use docrag_core::error::{Error, Result};
use docrag_core::http::HttpClient;
use docrag_core::traits::Embedder;

pub mod bedrock;
pub mod openai;

pub use bedrock::TitanEmbedder;
pub use openai::OpenAiEmbedder;

/// Hash-based embedder: same text, same vector; no network.
///
/// Character bigrams are hashed into buckets so texts sharing substrings
/// (including CJK text without spaces) land near each other.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    /// `dim` is clamped to at least 1.
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:d{dim}") }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let grams: Vec<&[char]> = if chars.len() < 2 { vec![&chars[..]] } else { chars.windows(2).collect() };
        for (i, gram) in grams.iter().enumerate() {
            if gram.is_empty() {
                continue;
            }
            let mut hasher = XxHash64::with_seed(0);
            gram.hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vector(text))
    }
}

/// Build the embedder selected by `embedding.provider`.
pub fn get_default_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    let e = &settings.embedding;
    let embedder: Arc<dyn Embedder> = match e.provider {
        Provider::Fake => Arc::new(FakeEmbedder::new(e.dimension)),
        Provider::Bedrock => Arc::new(TitanEmbedder::new(
            HttpClient::new(&settings.http)?,
            settings.bedrock.runtime_endpoint(),
            e.model_id.clone(),
            e.dimension,
            settings.bedrock.api_key.clone(),
        )),
        Provider::Openai => {
            let api_key = e
                .api_key
                .clone()
                .ok_or_else(|| Error::InvalidConfig("embedding.api_key is required for the openai provider".into()))?;
            Arc::new(OpenAiEmbedder::new(HttpClient::new(&settings.http)?, e.base_url.clone(), e.model_id.clone(), e.dimension, api_key))
        }
    };
    info!(embedder = embedder.embedder_id(), dim = embedder.dim(), "embedding client ready");
    Ok(embedder)
}

/// Reject vectors whose length differs from the configured dimension.
pub(crate) fn check_dim(expected: usize, v: &[f32]) -> Result<()> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(Error::external("embedding", format!("dimension mismatch: expected {expected}, got {}", v.len())))
    }
}
