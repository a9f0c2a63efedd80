//! ragpipe-embed
//!
//! Embedding backends behind `ragpipe_core::traits::Embedder`: the HTTP client
//! for an OpenAI-compatible embeddings server and a hashed offline fallback.

mod fake;
mod http;

use std::sync::Arc;

use tracing::info;

use ragpipe_core::config::Settings;
use ragpipe_core::traits::Embedder;
use ragpipe_core::Result;

pub use fake::{FakeEmbedder, DEFAULT_FAKE_DIM};
pub use http::HttpEmbedder;

pub fn get_default_embedder(settings: &Settings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake_embeddings {
        info!(dim = DEFAULT_FAKE_DIM, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::default()));
    }
    let embedder = HttpEmbedder::new(&settings.embedding)?;
    info!(endpoint = %embedder.endpoint(), model = %settings.embedding.model, "using HttpEmbedder");
    Ok(Arc::new(embedder))
}
