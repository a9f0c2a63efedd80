use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use ragpipe_core::config::RerankSettings;
use ragpipe_core::traits::Reranker;
use ragpipe_core::types::{Chunk, ScoredChunk, RELEVANCE_KEY};
use ragpipe_core::{Error, Result};

#[derive(Serialize)]
struct ScoreRequest<'a> {
    model: &'a str,
    text_1: &'a str,
    text_2: Vec<&'a str>,
}

pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    top_n: usize,
    score_threshold: f32,
}

impl HttpReranker {
    pub fn new(settings: &RerankSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("rerank http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            top_n: settings.top_n,
            score_threshold: settings.score_threshold,
        })
    }

    fn failure(&self, status: Option<u16>, detail: impl Into<String>) -> Error {
        Error::RerankService { endpoint: self.endpoint.clone(), status, detail: detail.into() }
    }

    /// One score per candidate, in candidate order. Entries the service left
    /// out (or sent without a usable index or score) stay at 0.0.
    async fn request_scores(&self, query: &str, candidates: &[Chunk]) -> Result<Vec<f32>> {
        let body = ScoreRequest { model: &self.model, text_1: query, text_2: candidates.iter().map(|c| c.content.as_str()).collect() };
        debug!(endpoint = %self.endpoint, candidates = candidates.len(), "rerank request");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.failure(None, format!("request failed: {e}")))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.failure(Some(status.as_u16()), format!("reading body failed: {e}")))?;
        if !status.is_success() {
            return Err(self.failure(Some(status.as_u16()), text));
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| self.failure(Some(status.as_u16()), format!("unparsable response ({e}): {text}")))?;
        let Some(data) = parsed.get("data").and_then(Value::as_array) else {
            return Err(self.failure(Some(status.as_u16()), format!("response has no 'data' field: {text}")));
        };

        let mut scores = vec![0.0f32; candidates.len()];
        for item in data {
            let index = item.get("index").and_then(Value::as_u64).and_then(|i| usize::try_from(i).ok());
            let score = item.get("score").and_then(Value::as_f64);
            if let (Some(index), Some(score)) = (index, score) {
                if let Some(slot) = scores.get_mut(index) {
                    *slot = score as f32;
                }
            }
        }
        Ok(scores)
    }

    fn rank(&self, candidates: &[Chunk], scores: &[f32]) -> Vec<ScoredChunk> {
        let mut kept: Vec<(&Chunk, f32)> =
            candidates.iter().zip(scores.iter().copied()).filter(|(_, score)| *score >= self.score_threshold).collect();
        kept.sort_by(|a, b| b.1.total_cmp(&a.1));
        kept.truncate(self.top_n);
        kept.into_iter()
            .map(|(chunk, score)| {
                let mut chunk = chunk.clone();
                chunk.metadata.insert(RELEVANCE_KEY.to_string(), score.to_string());
                ScoredChunk { chunk, relevance: Some(score) }
            })
            .collect()
    }

    fn unscored(&self, candidates: &[Chunk]) -> Vec<ScoredChunk> {
        candidates.iter().take(self.top_n).map(|c| ScoredChunk { chunk: c.clone(), relevance: None }).collect()
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, candidates: &[Chunk]) -> Vec<ScoredChunk> {
        if candidates.is_empty() {
            return Vec::new();
        }
        match self.request_scores(query, candidates).await {
            Ok(scores) => self.rank(candidates, &scores),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "rerank failed, keeping original order");
                self.unscored(candidates)
            }
        }
    }
}
