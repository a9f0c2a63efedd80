use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding backend was unreachable or answered with unusable data.
    #[error("Embedding service error at {endpoint} (status {}): {detail}", status_label(.status))]
    EmbeddingService { endpoint: String, status: Option<u16>, detail: String },

    /// Raised inside the reranker only; it is always downgraded to the
    /// unscored fallback before reaching a caller.
    #[error("Rerank service error at {endpoint} (status {}): {detail}", status_label(.status))]
    RerankService { endpoint: String, status: Option<u16>, detail: String },

    /// No usable collection at the storage location. Run a rebuild.
    #[error("Index not found at {}: run ingest to build it", .0.display())]
    IndexNotFound(PathBuf),

    #[error("Index build failed: {detail}")]
    IndexBuild {
        detail: String,
        #[source]
        source: Option<Box<Error>>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn index_build(detail: impl Into<String>) -> Self { Self::IndexBuild { detail: detail.into(), source: None } }

    pub fn index_build_from(detail: impl Into<String>, source: Error) -> Self {
        Self::IndexBuild { detail: detail.into(), source: Some(Box::new(source)) }
    }

    /// True when the caller should trigger a rebuild instead of failing hard.
    pub fn is_rebuild_required(&self) -> bool { matches!(self, Self::IndexNotFound(_) | Self::IndexBuild { .. }) }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

pub type Result<T> = std::result::Result<T, Error>;
