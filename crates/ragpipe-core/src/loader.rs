//! Document loading and cleaning ahead of chunking.
//!
//! `load_documents` walks a directory for Markdown files, `clean_documents`
//! strips control characters and collapses runs of blank lines, dropping
//! anything too short to be worth indexing.
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::types::Document;

/// Documents shorter than this after cleaning are dropped (a bare title, say).
pub const MIN_DOCUMENT_CHARS: usize = 10;

pub fn load_documents(data_dir: &Path) -> Result<Vec<Document>> {
    if !data_dir.is_dir() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("document directory does not exist: {}", data_dir.display()),
        )));
    }
    let files = list_markdown_files(data_dir);
    info!(dir = %data_dir.display(), files = files.len(), "loading documents");
    let mut documents = Vec::with_capacity(files.len());
    for file_path in &files {
        let content = match read_file_content(file_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        if content.trim().is_empty() {
            debug!(path = %file_path.display(), "skipping empty file");
            continue;
        }
        documents.push(Document::new(content, file_path.to_string_lossy()));
    }
    info!(documents = documents.len(), "loaded documents (empty files filtered)");
    Ok(documents)
}

pub fn clean_text(text: &str) -> String {
    let visible: String = text.chars().filter(|&c| !c.is_control() || matches!(c, '\n' | '\t' | '\r')).collect();
    let mut out = String::with_capacity(visible.len());
    let mut newlines = 0usize;
    for c in visible.chars() {
        if c == '\n' {
            newlines += 1;
            if newlines <= 2 { out.push(c); }
        } else {
            newlines = 0;
            out.push(c);
        }
    }
    out.trim().to_string()
}

pub fn clean_documents(documents: Vec<Document>) -> Vec<Document> {
    let before = documents.len();
    let cleaned: Vec<Document> = documents
        .into_iter()
        .filter_map(|doc| {
            let content = clean_text(&doc.content);
            (content.chars().count() >= MIN_DOCUMENT_CHARS).then(|| Document { content, metadata: doc.metadata })
        })
        .collect();
    debug!(before, after = cleaned.len(), "cleaned documents");
    cleaned
}

fn read_file_content(file_path: &Path) -> Result<String> {
    match fs::read_to_string(file_path) {
        Ok(content) => Ok(content),
        Err(_) => Ok(String::from_utf8_lossy(&fs::read(file_path)?).to_string()),
    }
}

fn list_markdown_files(root: &Path) -> Vec<PathBuf> {
    let mut md_files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("md") { md_files.push(path.to_path_buf()); }
    }
    md_files.sort();
    md_files
}
