//! ragpipe-chunk
//!
//! Hybrid Markdown chunker. A structural pass cuts each document at `#`..`###`
//! headings (see `markdown`), then a size pass breaks oversized sections at
//! the most natural boundary available while keeping fenced code intact (see
//! `recursive`).

mod markdown;
mod recursive;

use rayon::prelude::*;
use tracing::{debug, info};

use ragpipe_core::config::ChunkingSettings;
use ragpipe_core::types::{Chunk, Document};
use ragpipe_core::{Error, Result};
use recursive::RecursiveSplitter;

/// Source label used for chunk ids when a document carries no `source`.
const UNKNOWN_SOURCE: &str = "unknown";

#[derive(Debug, Clone)]
pub struct HybridSplitter {
    splitter: RecursiveSplitter,
}

impl HybridSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { splitter: RecursiveSplitter::new(chunk_size, chunk_overlap) })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    /// Splits every document, in parallel, preserving document order in the
    /// output. Documents that yield no text produce no chunks.
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents.par_iter().flat_map_iter(|doc| self.split_document(doc)).collect();
        info!(documents = documents.len(), chunks = chunks.len(), "split documents into chunks");
        chunks
    }

    pub fn split_document(&self, document: &Document) -> Vec<Chunk> {
        let source = document.source().unwrap_or(UNKNOWN_SOURCE);
        let mut chunks = Vec::new();
        for section in markdown::split_sections(&document.content) {
            for content in self.splitter.split_text(&section.text) {
                let chunk_index = chunks.len();
                let mut metadata = section.headings.clone();
                metadata.extend(document.metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                chunks.push(Chunk { id: format!("{source}:{chunk_index}"), content, metadata, chunk_index });
            }
        }
        debug!(source, chunks = chunks.len(), "split document");
        chunks
    }
}
