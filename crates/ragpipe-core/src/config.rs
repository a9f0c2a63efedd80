use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::SearchMode;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(env_name)?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    pub fn settings(&self) -> Result<Settings> {
        self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))
    }

    fn validate_for_env(&self, env: &str) -> Result<()> {
        let settings = self.settings()?;
        settings.validate()?;
        match env {
            "prod" | "production" if settings.use_fake_embeddings => {
                Err(Error::InvalidConfig("use_fake_embeddings is not allowed in production".into()))
            }
            _ => Ok(()),
        }
    }
}

/// Typed view over the merged configuration. Every section has defaults, so
/// an empty `config.toml` (or none at all) yields a working local setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Settings {
    /// Swap the HTTP embedder for the deterministic offline one.
    #[serde(deserialize_with = "lenient_flag")]
    pub use_fake_embeddings: bool,
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub rerank: RerankSettings,
    pub chunking: ChunkingSettings,
    pub index: IndexSettings,
    pub retrieval: RetrievalSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSettings {
    pub raw_dir: String,
}

impl Default for DataSettings {
    fn default() -> Self { Self { raw_dir: "./data/raw".into() } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4061/v1/embeddings".into(),
            model: "Qwen3-Embedding-8B".into(),
            api_key: Some("EMPTY".into()),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankSettings {
    pub endpoint: String,
    pub model: String,
    pub top_n: usize,
    pub score_threshold: f32,
    pub timeout_secs: u64,
}

impl Default for RerankSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:4062/score".into(),
            model: "bge-reranker-v2-m3".into(),
            top_n: 5,
            score_threshold: 0.3,
            timeout_secs: 10,
        }
    }
}

/// Chunk sizes are measured in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self { Self { chunk_size: 1000, chunk_overlap: 200 } }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexSettings {
    pub dir: String,
    pub collection: String,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    pub mmr_lambda: f32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self { dir: "./data/vector_store".into(), collection: "dev_docs_collection".into(), mmr_lambda: 0.5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Candidates handed to the reranker.
    pub candidate_k: usize,
    /// Pool size for the diversity step, as a multiple of `candidate_k`.
    pub fetch_multiplier: usize,
    pub mode: SearchMode,
}

impl Default for RetrievalSettings {
    fn default() -> Self { Self { candidate_k: 20, fetch_multiplier: 4, mode: SearchMode::Diversity } }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be greater than zero".into()));
        }
        if c.chunk_overlap >= c.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be less than chunking.chunk_size ({})",
                c.chunk_overlap, c.chunk_size
            )));
        }
        if self.rerank.top_n == 0 {
            return Err(Error::InvalidConfig("rerank.top_n must be greater than zero".into()));
        }
        if self.retrieval.candidate_k == 0 || self.retrieval.fetch_multiplier == 0 {
            return Err(Error::InvalidConfig("retrieval.candidate_k and retrieval.fetch_multiplier must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.index.mmr_lambda) {
            return Err(Error::InvalidConfig(format!("index.mmr_lambda ({}) must be within [0, 1]", self.index.mmr_lambda)));
        }
        if self.embedding.timeout_secs == 0 || self.rerank.timeout_secs == 0 {
            return Err(Error::InvalidConfig("remote call timeouts must be at least one second".into()));
        }
        if self.index.collection.trim().is_empty() {
            return Err(Error::InvalidConfig("index.collection must not be empty".into()));
        }
        Ok(())
    }

    pub fn index_dir(&self) -> PathBuf { expand_path(&self.index.dir) }

    pub fn raw_dir(&self) -> PathBuf { expand_path(&self.data.raw_dir) }
}

/// Accepts `true`, `1`, `"yes"` and friends so `APP_USE_FAKE_EMBEDDINGS=1`
/// keeps working.
fn lenient_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Text(String),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(i) => i != 0,
        Flag::Text(s) => matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    })
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
