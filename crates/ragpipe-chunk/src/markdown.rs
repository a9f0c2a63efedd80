//! Structural pass: split Markdown at `#`, `##` and `###` headings.
//!
//! Heading lines stay in the section body. Heading text is carried forward as
//! `h1`/`h2`/`h3` metadata until a heading of the same or a shallower level
//! replaces it. Fenced code is opaque, so a `# comment` in a shell snippet is
//! not a heading.

use ragpipe_core::types::Meta;

const LEVEL_KEYS: [&str; 3] = ["h1", "h2", "h3"];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Section {
    pub text: String,
    pub headings: Meta,
}

/// Returns the fence marker if `line` opens (or closes) a fenced code block.
pub(crate) fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

/// `(level, title)` for an ATX heading of depth 1..=3. The marker must be
/// followed by a space or end the line, so `####` and `#tag` are plain text.
fn heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim();
    for (level, marker) in [(3, "###"), (2, "##"), (1, "#")] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            if rest.is_empty() || rest.starts_with(' ') {
                return Some((level, rest.trim()));
            }
        }
    }
    None
}

#[derive(Default)]
struct Pending<'a> {
    lines: Vec<&'a str>,
    headings: [Option<String>; 3],
    /// Deepest heading level seen while the section held nothing but headings.
    heading_only_level: Option<usize>,
}

impl<'a> Pending<'a> {
    fn flush(&mut self, out: &mut Vec<Section>) {
        let text = self.lines.join("\n");
        self.lines.clear();
        self.heading_only_level = None;
        if text.trim().is_empty() {
            return;
        }
        let headings = LEVEL_KEYS
            .iter()
            .zip(self.headings.iter())
            .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
            .collect();
        out.push(Section { text, headings });
    }
}

pub(crate) fn split_sections(text: &str) -> Vec<Section> {
    let mut sections = Vec::new();
    let mut active: [Option<String>; 3] = Default::default();
    let mut pending = Pending::default();
    let mut open_fence: Option<&'static str> = None;

    for line in text.split('\n') {
        if let Some(marker) = open_fence {
            if line.trim_start().starts_with(marker) { open_fence = None; }
            pending.lines.push(line);
            continue;
        }
        if let Some(marker) = fence_marker(line) {
            open_fence = Some(marker);
            pending.heading_only_level = None;
            pending.lines.push(line);
            continue;
        }
        let Some((level, title)) = heading(line) else {
            if !line.trim().is_empty() { pending.heading_only_level = None; }
            pending.lines.push(line);
            continue;
        };

        active[level - 1] = Some(title.to_string());
        for deeper in active.iter_mut().skip(level) { *deeper = None; }

        // `# A` directly followed by `## B` stays one section carrying both.
        let absorb = matches!(pending.heading_only_level, Some(prev) if level > prev);
        if !absorb {
            pending.flush(&mut sections);
        }
        pending.lines.push(line);
        pending.headings = active.clone();
        pending.heading_only_level = Some(level);
    }
    pending.flush(&mut sections);
    sections
}
