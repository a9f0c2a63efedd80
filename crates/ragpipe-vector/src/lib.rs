//! ragpipe-vector
//!
//! LanceDB-backed vector index: build-to-new-location with an atomic active
//! pointer swap, and similarity or MMR search over the active build.

pub mod index_build;
mod mmr;
pub mod schema;
pub mod search;
pub mod table;
mod writer;

pub use index_build::{VectorIndex, DEFAULT_MMR_LAMBDA};
pub use search::IndexHandle;

use ragpipe_core::Error;

pub(crate) fn storage_err(e: impl std::fmt::Display) -> Error { Error::Storage(e.to_string()) }
