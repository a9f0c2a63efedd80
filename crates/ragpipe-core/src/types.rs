//! Domain types shared by the chunker, index, reranker and retriever.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Metadata key naming where a document (and its chunks) came from.
pub const SOURCE_KEY: &str = "source";
/// Metadata key the reranker writes its score under.
pub const RELEVANCE_KEY: &str = "relevance_score";

/// An ingested text unit. `metadata` carries at least `source`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Meta::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self { content: content.into(), metadata }
    }

    pub fn source(&self) -> Option<&str> { self.metadata.get(SOURCE_KEY).map(String::as_str) }
}

/// A contiguous span of a document, the atomic retrieval unit.
///
/// - `id`: `{source}:{chunk_index}`, unique within one build
/// - `content`: the text payload
/// - `metadata`: document metadata merged over heading metadata (`h1`..`h3`)
/// - `chunk_index`: position within the parent document; overlap is always
///   relative to the chunk with the previous index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: ChunkId,
    pub content: String,
    pub metadata: Meta,
    pub chunk_index: usize,
}

impl Chunk {
    pub fn source(&self) -> Option<&str> { self.metadata.get(SOURCE_KEY).map(String::as_str) }
}

/// How the vector index picks `k` results out of its `fetch_k` pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Top `k` by vector distance.
    Similarity,
    /// Maximal Marginal Relevance over the pool.
    #[default]
    Diversity,
}

/// A candidate produced by the vector index. `score` is `1 - cosine distance`,
/// higher is better.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk: Chunk,
    pub score: f32,
}

/// A chunk after reranking. `relevance` is `None` when the reranker could not
/// score it (fail-open path).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub relevance: Option<f32>,
}

impl From<SearchHit> for ScoredChunk {
    fn from(hit: SearchHit) -> Self { Self { chunk: hit.chunk, relevance: None } }
}
