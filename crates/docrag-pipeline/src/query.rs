use serde::Serialize;
use tracing::{debug, info};

use docrag_core::config::EmptyContextPolicy;
use docrag_core::error::{Error, Result};
use docrag_core::types::ScoredChunk;

use crate::prompt::{bound_context, build_prompt};
use crate::Rag;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Context {
    pub doc_id: String,
    pub chunk_index: usize,
    pub score: f32,
    pub text: String,
}

impl From<ScoredChunk> for Context {
    fn from(c: ScoredChunk) -> Self {
        Self { doc_id: c.doc_id, chunk_index: c.chunk_index, score: c.score, text: c.text }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub context_found: bool,
    /// Chunks handed to the model, most similar first, as sent.
    pub contexts: Vec<Context>,
}

impl Rag {
    pub async fn ask(&self, question: &str, top_k: Option<usize>) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::validation("query is required"));
        }
        let k = top_k.unwrap_or(self.query.top_k);
        if k == 0 || k > self.query.max_top_k {
            return Err(Error::validation(format!("top_k must be within 1..={}, got {k}", self.query.max_top_k)));
        }

        let vector = self.embedder.embed(question).await?;
        let mut hits = self.store.search(&vector, k).await?;
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);

        if hits.is_empty() && self.query.empty_context == EmptyContextPolicy::Error {
            return Err(Error::NoContext);
        }
        let contexts = bound_context(hits, self.query.max_context_chars);
        debug!(k, used = contexts.len(), "retrieved context");

        let prompt = build_prompt(&self.system_prompt, question, &contexts);
        let answer = self.generator.generate(&prompt).await?;
        info!(model = self.generator.model_id(), contexts = contexts.len(), "answered question");
        Ok(Answer { answer, context_found: !contexts.is_empty(), contexts: contexts.into_iter().map(Context::from).collect() })
    }
}
