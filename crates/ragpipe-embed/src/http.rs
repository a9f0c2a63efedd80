//! OpenAI-compatible `/v1/embeddings` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use ragpipe_core::config::EmbeddingSettings;
use ragpipe_core::traits::Embedder;
use ragpipe_core::{Error, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("embedding http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> &str { &self.endpoint }

    fn failure(&self, status: Option<u16>, detail: impl Into<String>) -> Error {
        let detail = detail.into();
        error!(endpoint = %self.endpoint, status = ?status, detail = %detail, "embedding request failed");
        Error::EmbeddingService { endpoint: self.endpoint.clone(), status, detail }
    }

    async fn post(&self, input: Vec<&str>) -> Result<Vec<Vec<f32>>> {
        let expected = input.len();
        debug!(endpoint = %self.endpoint, model = %self.model, batch_size = expected, "embedding batch");
        let body = EmbeddingRequest { model: &self.model, input, encoding_format: "float" };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| self.failure(None, format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.failure(Some(status.as_u16()), format!("reading body failed: {e}")))?;
        if !status.is_success() {
            return Err(self.failure(Some(status.as_u16()), text));
        }

        let parsed: EmbeddingResponse = serde_json::from_str(&text)
            .map_err(|e| self.failure(Some(status.as_u16()), format!("unparsable response ({e}): {text}")))?;
        if parsed.data.len() != expected {
            return Err(self.failure(
                Some(status.as_u16()),
                format!("expected {expected} embeddings, got {}", parsed.data.len()),
            ));
        }

        // Servers may answer out of order; `index` is authoritative.
        let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
        for item in parsed.data {
            let Some(slot) = slots.get_mut(item.index) else {
                return Err(self.failure(Some(status.as_u16()), format!("index {} out of range", item.index)));
            };
            if slot.is_some() {
                return Err(self.failure(Some(status.as_u16()), format!("duplicate index {}", item.index)));
            }
            *slot = Some(item.embedding);
        }
        Ok(slots.into_iter().flatten().collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn embedder_id(&self) -> &str { &self.model }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidArgument("cannot embed an empty query".into()));
        }
        self.post(vec![text])
            .await?
            .pop()
            .ok_or_else(|| self.failure(None, "empty response for query"))
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let input: Vec<&str> = texts.iter().map(String::as_str).filter(|t| !t.is_empty()).collect();
        if input.is_empty() {
            return Ok(Vec::new());
        }
        self.post(input).await
    }
}
