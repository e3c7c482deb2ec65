use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub chunking: ChunkingConfig,
    pub query: QuerySettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub bedrock: BedrockSettings,
    pub vector: VectorSettings,
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: String,
    pub workers: usize,
    pub max_body_bytes: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: "0.0.0.0:8000".to_string(), workers: 4, max_body_bytes: 20 * 1024 * 1024 }
    }
}

/// What `/ask` does when retrieval finds nothing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptyContextPolicy {
    /// Call the model without context and flag `context_found: false`.
    #[default]
    Answer,
    /// Fail with `Error::NoContext`.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuerySettings {
    pub top_k: usize,
    pub max_top_k: usize,
    pub max_context_chars: usize,
    pub empty_context: EmptyContextPolicy,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self { top_k: 5, max_top_k: 50, max_context_chars: 8000, empty_context: EmptyContextPolicy::Answer }
    }
}

/// Longest input the Bedrock Titan embedding client sends.
pub const BEDROCK_EMBED_MAX_CHARS: usize = 8000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Bedrock,
    Openai,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: Provider,
    pub model_id: String,
    pub dimension: usize,
    /// Base URL for OpenAI-compatible providers.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Bedrock,
            model_id: "amazon.titan-embed-text-v2:0".to_string(),
            dimension: 1024,
            base_url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub provider: Provider,
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system_prompt: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: Provider::Bedrock,
            model_id: "anthropic.claude-3-5-sonnet-20240620-v1:0".to_string(),
            max_tokens: 1024,
            temperature: 0.2,
            system_prompt: None,
            base_url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BedrockSettings {
    pub region: String,
    /// Override for the runtime endpoint; defaults to the regional host.
    pub endpoint: Option<String>,
    /// Bedrock API key sent as a bearer token.
    pub api_key: Option<String>,
}

impl Default for BedrockSettings {
    fn default() -> Self {
        Self { region: "ap-northeast-1".to_string(), endpoint: None, api_key: None }
    }
}

impl BedrockSettings {
    pub fn runtime_endpoint(&self) -> String {
        match &self.endpoint {
            Some(e) => e.trim_end_matches('/').to_string(),
            None => format!("https://bedrock-runtime.{}.amazonaws.com", self.region),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VectorBackend {
    Lancedb,
    Qdrant,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VectorSettings {
    pub backend: VectorBackend,
    pub lancedb_dir: String,
    pub table: String,
    pub qdrant_url: String,
    pub collection: String,
    pub qdrant_api_key: Option<String>,
}

impl Default for VectorSettings {
    fn default() -> Self {
        Self {
            backend: VectorBackend::Lancedb,
            lancedb_dir: "./data/lancedb".to_string(),
            table: "chunks".to_string(),
            qdrant_url: "http://localhost:6333".to_string(),
            collection: "docs_jp".to_string(),
            qdrant_api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub backoff_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: 30, max_retries: 2, backoff_ms: 200 }
    }
}

/// Unprefixed environment variables from existing deployments, mapped onto settings keys.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("AWS_REGION", "bedrock.region"),
    ("AWS_BEARER_TOKEN_BEDROCK", "bedrock.api_key"),
    ("BEDROCK_EMBED_MODEL_ID", "embedding.model_id"),
    ("BEDROCK_LLM_MODEL_ID", "generation.model_id"),
    ("QDRANT_URL", "vector.qdrant_url"),
    ("QDRANT_COLLECTION", "vector.collection"),
    ("QDRANT_API_KEY", "vector.qdrant_api_key"),
];

pub struct Config {
    settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        for &(var, key) in LEGACY_ENV {
            figment = figment.merge(Env::raw().only(&[var]).map(move |_| key.into()));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let settings: Settings = figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        validate(&settings)?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn into_settings(self) -> Settings {
        self.settings
    }
}

pub fn validate(s: &Settings) -> Result<()> {
    s.chunking.validate().map_err(|e| Error::InvalidConfig(e.to_string()))?;
    if s.server.workers == 0 {
        return Err(Error::InvalidConfig("server.workers must be at least 1".into()));
    }
    if s.query.top_k == 0 || s.query.top_k > s.query.max_top_k {
        return Err(Error::InvalidConfig(format!(
            "query.top_k must be within 1..={}, got {}",
            s.query.max_top_k, s.query.top_k
        )));
    }
    if s.query.max_context_chars == 0 {
        return Err(Error::InvalidConfig("query.max_context_chars must be positive".into()));
    }
    if s.embedding.provider == Provider::Bedrock && s.chunking.chunk_size > BEDROCK_EMBED_MAX_CHARS {
        return Err(Error::InvalidConfig(format!(
            "chunking.chunk_size {} exceeds the {BEDROCK_EMBED_MAX_CHARS}-character Bedrock embedding input limit",
            s.chunking.chunk_size
        )));
    }
    if s.embedding.dimension == 0 {
        return Err(Error::InvalidConfig("embedding.dimension must be positive".into()));
    }
    Ok(())
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
