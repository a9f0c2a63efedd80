//! ragpipe-retrieval
//!
//! Two-stage query path: the vector index proposes candidates, the reranker
//! narrows them to the final top-N.

mod context;

pub use context::format_context;

use tracing::{debug, info};

use ragpipe_core::config::RetrievalSettings;
use ragpipe_core::traits::{Reranker, VectorSearch};
use ragpipe_core::types::{Chunk, ScoredChunk, SearchMode};
use ragpipe_core::{Error, Result};

pub struct Retriever<S, R> where S: VectorSearch, R: Reranker {
    search: S,
    reranker: R,
    candidate_k: usize,
    fetch_multiplier: usize,
    mode: SearchMode,
}

impl<S, R> Retriever<S, R> where S: VectorSearch, R: Reranker {
    pub fn new(search: S, reranker: R, settings: &RetrievalSettings) -> Result<Self> {
        if settings.candidate_k == 0 || settings.fetch_multiplier == 0 {
            return Err(Error::InvalidConfig("candidate_k and fetch_multiplier must be positive".into()));
        }
        Ok(Self {
            search,
            reranker,
            candidate_k: settings.candidate_k,
            fetch_multiplier: settings.fetch_multiplier,
            mode: settings.mode,
        })
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Candidate generation errors propagate; reranking never fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let fetch_k = self.candidate_k.saturating_mul(self.fetch_multiplier);
        let hits = self.search.search(query, self.candidate_k, fetch_k, self.mode).await?;
        debug!(candidates = hits.len(), k = self.candidate_k, fetch_k, mode = ?self.mode, "candidates fetched");
        let candidates: Vec<Chunk> = hits.into_iter().map(|h| h.chunk).collect();
        let ranked = self.reranker.score(query, &candidates).await;
        info!(candidates = candidates.len(), returned = ranked.len(), "retrieval complete");
        Ok(ranked)
    }
}
