use ragpipe_core::types::ScoredChunk;

/// Renders retrieved chunks as `<doc>` blocks for a generation prompt.
pub fn format_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, scored)| {
            let source = scored.chunk.source().unwrap_or("Unknown");
            format!("<doc id='{i}' source='{source}'>\n{}\n</doc>", scored.chunk.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
