//! Property tests for the hybrid chunker's size and code-fence guarantees.

use ragpipe_chunk::HybridSplitter;
use ragpipe_core::types::Document;
use proptest::prelude::*;

fn arb_sizes() -> impl Strategy<Value = (usize, usize)> {
    (20usize..120).prop_flat_map(|size| (Just(size), 0..size))
}

fn arb_code_block() -> impl Strategy<Value = String> {
    proptest::collection::vec("[a-z(){};= ]{1,30}", 1..12)
        .prop_map(|lines| format!("```rust\n{}\n```", lines.join("\n")))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prose_chunks_never_exceed_chunk_size(
        text in "[a-z \n.]{0,400}",
        (size, overlap) in arb_sizes(),
    ) {
        let splitter = HybridSplitter::new(size, overlap).unwrap();
        let chunks = splitter.split_document(&Document::new(text, "prose.md"));

        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert!(chunk.content.chars().count() <= size, "chunk {} is {:?}", i, chunk.content);
            prop_assert!(!chunk.content.trim().is_empty());
            prop_assert_eq!(chunk.chunk_index, i);
            prop_assert_eq!(&chunk.id, &format!("prose.md:{}", i));
        }
    }

    #[test]
    fn code_blocks_survive_whole(
        before in "[a-z .\n]{0,200}",
        after in "[a-z .\n]{0,200}",
        code in arb_code_block(),
        (size, overlap) in arb_sizes(),
    ) {
        let splitter = HybridSplitter::new(size, overlap).unwrap();
        let text = format!("{before}\n{code}\n{after}");
        let chunks = splitter.split_document(&Document::new(text, "code.md"));

        prop_assert!(chunks.iter().any(|c| c.content.contains(&code)), "code block was split: {:?}", chunks);
        for chunk in &chunks {
            prop_assert_eq!(chunk.content.matches("```").count() % 2, 0);
            if !chunk.content.contains("```") {
                prop_assert!(chunk.content.chars().count() <= size);
            }
        }
    }
}

#[test]
fn long_section_is_split_and_keeps_its_headings() {
    let paragraph = "Vectors are stored per build and swapped in atomically. ".repeat(4);
    let body = vec![paragraph.trim_end(); 6].join("\n\n");
    let text = format!("# Storage\n## Builds\n{body}");
    let splitter = HybridSplitter::new(300, 50).unwrap();

    let chunks = splitter.split(&[Document::new(text, "docs/storage.md")]);

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= 300);
        assert_eq!(chunk.metadata.get("h1").map(String::as_str), Some("Storage"));
        assert_eq!(chunk.metadata.get("h2").map(String::as_str), Some("Builds"));
        assert_eq!(chunk.source(), Some("docs/storage.md"));
    }
}

#[test]
fn split_keeps_document_order() {
    let splitter = HybridSplitter::new(200, 20).unwrap();
    let docs: Vec<Document> =
        (0..8).map(|i| Document::new(format!("Document number {i} body."), format!("doc{i}.md"))).collect();

    let chunks = splitter.split(&docs);

    let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
    let expected: Vec<String> = (0..8).map(|i| format!("doc{i}.md:0")).collect();
    assert_eq!(ids, expected.iter().map(String::as_str).collect::<Vec<_>>());
}
