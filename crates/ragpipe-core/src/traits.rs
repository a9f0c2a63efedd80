//! Capability seams between pipeline stages. Each has one HTTP or LanceDB
//! backed implementation in its own crate and test doubles in the tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Chunk, ScoredChunk, SearchHit, SearchMode};

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backend/model, used in logs and status output.
    fn embedder_id(&self) -> &str;
    /// Vector width when known before the first call.
    fn dimension_hint(&self) -> Option<usize> { None }
    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
    /// Embed a batch; one vector per non-empty input, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize, fetch_k: usize, mode: SearchMode) -> Result<Vec<SearchHit>>;
}

/// Re-scores candidates against a query. Never fails: implementations fall
/// back to the input order without scores when scoring is unavailable.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn score(&self, query: &str, candidates: &[Chunk]) -> Vec<ScoredChunk>;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn embedder_id(&self) -> &str { (**self).embedder_id() }

    fn dimension_hint(&self) -> Option<usize> { (**self).dimension_hint() }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> { (**self).embed_query(text).await }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { (**self).embed_documents(texts).await }
}

#[async_trait]
impl<T: VectorSearch + ?Sized> VectorSearch for Arc<T> {
    async fn search(&self, query: &str, k: usize, fetch_k: usize, mode: SearchMode) -> Result<Vec<SearchHit>> {
        (**self).search(query, k, fetch_k, mode).await
    }
}

#[async_trait]
impl<T: Reranker + ?Sized> Reranker for Arc<T> {
    async fn score(&self, query: &str, candidates: &[Chunk]) -> Vec<ScoredChunk> { (**self).score(query, candidates).await }
}
