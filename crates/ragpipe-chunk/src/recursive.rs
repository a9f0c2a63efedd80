//! Size pass: boundary-aware recursive splitting with overlap.
//!
//! Boundaries are tried in priority order: fenced code block edges, blank
//! lines, newlines, spaces, then single characters. A piece that still exceeds
//! the target is split again at the next boundary, except fenced code blocks,
//! which are atomic and are emitted whole even when oversized. Separators stay
//! at the start of the piece that follows them, so concatenating consecutive
//! pieces reproduces the source text exactly.

use std::collections::VecDeque;

use crate::markdown::fence_marker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    CodeFence,
    Literal(&'static str),
    Char,
}

const BOUNDARIES: [Boundary; 5] =
    [Boundary::CodeFence, Boundary::Literal("\n\n"), Boundary::Literal("\n"), Boundary::Literal(" "), Boundary::Char];

#[derive(Debug, Clone, Copy)]
struct Piece<'a> {
    text: &'a str,
    len: usize,
    atomic: bool,
}

impl<'a> Piece<'a> {
    fn new(text: &'a str, atomic: bool) -> Self { Self { text, len: text.chars().count(), atomic } }
}

#[derive(Debug, Clone)]
pub(crate) struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    /// Callers validate `chunk_size > 0` and `chunk_overlap < chunk_size`.
    pub(crate) fn new(chunk_size: usize, chunk_overlap: usize) -> Self { Self { chunk_size, chunk_overlap } }

    pub(crate) fn split_text(&self, text: &str) -> Vec<String> {
        let mut out = Vec::new();
        self.split_from(text, 0, &mut out);
        out
    }

    fn split_from(&self, text: &str, level: usize, out: &mut Vec<String>) {
        let Some((level, pieces)) = BOUNDARIES
            .iter()
            .enumerate()
            .skip(level)
            .map(|(i, b)| (i, split_on(text, *b)))
            .find(|(i, pieces)| pieces.len() > 1 || pieces.iter().any(|p| p.atomic) || BOUNDARIES[*i] == Boundary::Char)
        else {
            return;
        };

        let mut fitting: Vec<Piece<'_>> = Vec::new();
        for piece in pieces {
            if piece.len <= self.chunk_size {
                fitting.push(piece);
                continue;
            }
            self.merge(&mut fitting, out);
            if piece.atomic {
                push_trimmed(piece.text, out);
            } else {
                self.split_from(piece.text, level + 1, out);
            }
        }
        self.merge(&mut fitting, out);
    }

    /// Greedily packs pieces into chunks of at most `chunk_size` characters,
    /// starting each new chunk with up to `chunk_overlap` characters of the
    /// previous chunk's trailing pieces.
    fn merge(&self, pieces: &mut Vec<Piece<'_>>, out: &mut Vec<String>) {
        let mut window: VecDeque<Piece<'_>> = VecDeque::new();
        let mut total = 0usize;
        for piece in pieces.drain(..) {
            if total + piece.len > self.chunk_size && !window.is_empty() {
                emit(&window, out);
                while total > self.chunk_overlap || (total > 0 && total + piece.len > self.chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= front.len,
                        None => break,
                    }
                }
            }
            total += piece.len;
            window.push_back(piece);
        }
        if !window.is_empty() {
            emit(&window, out);
        }
    }
}

fn emit(window: &VecDeque<Piece<'_>>, out: &mut Vec<String>) {
    let joined: String = window.iter().map(|p| p.text).collect();
    push_trimmed(&joined, out);
}

fn push_trimmed(text: &str, out: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn split_on(text: &str, boundary: Boundary) -> Vec<Piece<'_>> {
    match boundary {
        Boundary::CodeFence => split_fences(text),
        Boundary::Literal(sep) => {
            let mut pieces = Vec::new();
            let mut start = 0;
            for (pos, _) in text.match_indices(sep) {
                if pos > start {
                    pieces.push(Piece::new(&text[start..pos], false));
                }
                start = pos;
            }
            if start < text.len() {
                pieces.push(Piece::new(&text[start..], false));
            }
            pieces
        }
        Boundary::Char => text.char_indices().map(|(i, c)| Piece::new(&text[i..i + c.len_utf8()], false)).collect(),
    }
}

/// Cuts `text` into prose runs and whole fenced blocks (opening line through
/// closing line). An unclosed fence runs to the end of the text.
fn split_fences(text: &str) -> Vec<Piece<'_>> {
    let mut pieces = Vec::new();
    let mut offset = 0;
    let mut prose_start = 0;
    let mut open: Option<(usize, &'static str)> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        match open {
            None => {
                if let Some(marker) = fence_marker(line) {
                    if line_start > prose_start {
                        pieces.push(Piece::new(&text[prose_start..line_start], false));
                    }
                    open = Some((line_start, marker));
                }
            }
            Some((start, marker)) => {
                if line.trim_start().starts_with(marker) {
                    pieces.push(Piece::new(&text[start..offset], true));
                    open = None;
                    prose_start = offset;
                }
            }
        }
    }
    match open {
        Some((start, _)) => pieces.push(Piece::new(&text[start..], true)),
        None if prose_start < text.len() => pieces.push(Piece::new(&text[prose_start..], false)),
        None => {}
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lens(chunks: &[String]) -> Vec<usize> { chunks.iter().map(|c| c.chars().count()).collect() }

    #[test]
    fn short_text_is_one_chunk() {
        let splitter = RecursiveSplitter::new(100, 20);
        assert_eq!(splitter.split_text("  just a line  "), vec!["just a line".to_string()]);
    }

    #[test]
    fn prefers_paragraph_breaks() {
        let splitter = RecursiveSplitter::new(30, 0);
        let text = "first paragraph here\n\nsecond paragraph here\n\nthird one";
        let chunks = splitter.split_text(text);
        assert_eq!(chunks, vec!["first paragraph here", "second paragraph here", "third one"]);
    }

    #[test]
    fn overlap_carries_trailing_words() {
        let splitter = RecursiveSplitter::new(12, 6);
        let chunks = splitter.split_text("aaa bbb ccc ddd eee");
        assert!(lens(&chunks).iter().all(|&l| l <= 12), "{chunks:?}");
        for pair in chunks.windows(2) {
            let last_word = pair[0].split(' ').last().unwrap();
            assert!(pair[1].starts_with(last_word), "{pair:?} should overlap");
        }
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let splitter = RecursiveSplitter::new(10, 2);
        let text = "x".repeat(35);
        let chunks = splitter.split_text(&text);
        assert!(lens(&chunks).iter().all(|&l| l <= 10));
        assert_eq!(chunks[0].len(), 10);
        assert!(chunks.len() >= 4);
    }

    #[test]
    fn multibyte_text_is_measured_in_characters() {
        let splitter = RecursiveSplitter::new(4, 0);
        let chunks = splitter.split_text("日本語のテキスト");
        assert_eq!(chunks, vec!["日本語の", "テキスト"]);
    }

    #[test]
    fn code_block_is_never_bisected() {
        let code = "```rust\nfn main() {\n    println!(\"hi\");\n}\n```";
        let text = format!("Some intro words here.\n{code}\nAnd a closing remark after.");
        let splitter = RecursiveSplitter::new(60, 10);
        let chunks = splitter.split_text(&text);
        assert!(chunks.iter().any(|c| c.contains(code)), "{chunks:?}");
        for chunk in &chunks {
            assert_eq!(chunk.matches("```").count() % 2, 0, "unbalanced fence in {chunk:?}");
        }
    }

    #[test]
    fn oversized_code_block_is_kept_whole() {
        let body: String = (0..20).map(|i| format!("let v{i} = {i};\n")).collect();
        let code = format!("```rust\n{body}```");
        let text = format!("Before.\n{code}\nAfter.");
        let splitter = RecursiveSplitter::new(50, 10);
        let chunks = splitter.split_text(&text);
        assert!(chunks.contains(&code), "{chunks:?}");
        for chunk in chunks.iter().filter(|c| **c != code) {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn text_that_is_only_a_code_block_stays_atomic() {
        let code = format!("```\n{}\n```", "word ".repeat(30).trim_end());
        let splitter = RecursiveSplitter::new(40, 5);
        assert_eq!(splitter.split_text(&code), vec![code.clone()]);
    }

    #[test]
    fn split_fences_pieces_concatenate_to_source() {
        let text = "a\n```\nb\n```\nc\n~~~\nunclosed";
        let pieces = split_fences(text);
        let joined: String = pieces.iter().map(|p| p.text).collect();
        assert_eq!(joined, text);
        assert_eq!(pieces.iter().filter(|p| p.atomic).count(), 2);
    }
}
