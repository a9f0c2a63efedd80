use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use twox_hash::XxHash64;

use ragpipe_core::traits::Embedder;
use ragpipe_core::Result;

pub const DEFAULT_FAKE_DIM: usize = 1024;

/// Deterministic bag-of-words embedder for offline runs and tests. Texts that
/// share words land close together; identical texts map to identical vectors.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1), id: format!("fake-xxhash-{}", dim.max(1)) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Default for FakeEmbedder {
    fn default() -> Self { Self::new(DEFAULT_FAKE_DIM) }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }

    fn dimension_hint(&self) -> Option<usize> { Some(self.dim) }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> { Ok(self.embed_text(text)) }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().filter(|t| !t.is_empty()).map(|t| self.embed_text(t)).collect())
    }
}
