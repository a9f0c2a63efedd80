//! ragpipe-rerank
//!
//! Cross-encoder reranking against a `/score` endpoint. Scoring is fail-open:
//! any service problem yields the leading candidates unscored instead of an
//! error.

mod http;

pub use http::HttpReranker;
