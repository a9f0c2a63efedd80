use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ragpipe_core::config::RetrievalSettings;
use ragpipe_core::traits::{Reranker, VectorSearch};
use ragpipe_core::types::{Chunk, Meta, ScoredChunk, SearchHit, SearchMode};
use ragpipe_core::{Error, Result};
use ragpipe_retrieval::{format_context, Retriever};

fn chunk(i: usize) -> Chunk {
    let mut metadata = Meta::new();
    metadata.insert("source".into(), format!("doc{i}.md"));
    Chunk { id: format!("doc{i}.md:0"), content: format!("chunk {i}"), metadata, chunk_index: 0 }
}

#[derive(Default)]
struct RecordingSearch {
    calls: Mutex<Vec<(String, usize, usize, SearchMode)>>,
    fail: bool,
}

#[async_trait]
impl VectorSearch for RecordingSearch {
    async fn search(&self, query: &str, k: usize, fetch_k: usize, mode: SearchMode) -> Result<Vec<SearchHit>> {
        self.calls.lock().unwrap().push((query.to_string(), k, fetch_k, mode));
        if self.fail {
            return Err(Error::EmbeddingService { endpoint: "http://stub".into(), status: None, detail: "timeout".into() });
        }
        Ok((0..k.min(6)).map(|i| SearchHit { chunk: chunk(i), score: 1.0 - i as f32 * 0.1 }).collect())
    }
}

/// Keeps the last two candidates, best last-first.
struct TailReranker;

#[async_trait]
impl Reranker for TailReranker {
    async fn score(&self, _query: &str, candidates: &[Chunk]) -> Vec<ScoredChunk> {
        candidates
            .iter()
            .rev()
            .take(2)
            .enumerate()
            .map(|(i, c)| ScoredChunk { chunk: c.clone(), relevance: Some(0.9 - i as f32 * 0.1) })
            .collect()
    }
}

#[tokio::test]
async fn retrieve_fetches_candidates_then_reranks() -> anyhow::Result<()> {
    let retriever = Retriever::new(RecordingSearch::default(), TailReranker, &RetrievalSettings::default())?;

    let out = retriever.retrieve("how do builds swap?").await?;

    let ids: Vec<&str> = out.iter().map(|s| s.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["doc5.md:0", "doc4.md:0"]);
    assert_eq!(out[0].relevance, Some(0.9));
    Ok(())
}

#[tokio::test]
async fn search_parameters_follow_settings() -> anyhow::Result<()> {
    let search = Arc::new(RecordingSearch::default());
    let settings = RetrievalSettings { candidate_k: 7, fetch_multiplier: 3, mode: SearchMode::Diversity };
    let retriever = Retriever::new(search.clone(), TailReranker, &settings)?.with_mode(SearchMode::Similarity);

    retriever.retrieve("q").await?;

    let calls = search.calls.lock().unwrap().clone();
    assert_eq!(calls, vec![("q".to_string(), 7, 21, SearchMode::Similarity)]);
    Ok(())
}

#[tokio::test]
async fn candidate_errors_propagate() {
    let search = RecordingSearch { fail: true, ..Default::default() };
    let retriever = Retriever::new(search, TailReranker, &RetrievalSettings::default()).unwrap();

    let err = retriever.retrieve("q").await.unwrap_err();

    assert!(matches!(err, Error::EmbeddingService { .. }));
}

#[tokio::test]
async fn context_is_built_from_reranked_chunks() -> anyhow::Result<()> {
    let retriever = Retriever::new(RecordingSearch::default(), TailReranker, &RetrievalSettings::default())?;
    let context = format_context(&retriever.retrieve("q").await?);
    assert!(context.starts_with("<doc id='0' source='doc5.md'>\nchunk 5\n</doc>"));
    Ok(())
}
