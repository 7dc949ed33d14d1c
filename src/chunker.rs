//! Overlapping fixed-size text chunker.
//!
//! Splits a document body into consecutive character windows of at most
//! `max_chars`, where each window starts `overlap_chars` before the end of
//! the previous one so context at window boundaries is not lost. When a
//! window boundary would fall mid-paragraph and a paragraph break (`\n\n`)
//! exists in the second half of the window, the window ends at the break
//! instead — a preference, not a guarantee.
//!
//! Offsets and sizes are measured in characters, never bytes, so the
//! splitter is safe on multi-byte UTF-8 input. Each chunk records its
//! start offset into the source document and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::models::{Chunk, Document};

/// Split one document into overlapping chunks.
///
/// Deterministic: the same body and parameters always produce the same
/// chunk texts, offsets, and order. A document no longer than `max_chars`
/// yields exactly one chunk equal to the whole body at offset 0.
///
/// `overlap_chars` must be smaller than `max_chars`; config validation
/// enforces this before ingestion starts.
pub fn split_document(document: &Document, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let body = &document.body;

    // Byte offset of every character boundary, plus the end of the string,
    // so char-indexed windows can slice without walking the string again.
    let mut boundaries: Vec<usize> = body.char_indices().map(|(i, _)| i).collect();
    boundaries.push(body.len());
    let total_chars = boundaries.len() - 1;

    if total_chars <= max_chars {
        return vec![make_chunk(&document.relative_path, 0, 0, body)];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut chunk_index: i64 = 0;

    loop {
        let mut end = (start + max_chars).min(total_chars);

        if end < total_chars {
            // Prefer ending at a paragraph break, but only one in the
            // second half of the window; breaking earlier would produce
            // degenerate slivers.
            let window = &body[boundaries[start]..boundaries[end]];
            if let Some(break_byte) = window.rfind("\n\n") {
                let break_chars = window[..break_byte].chars().count();
                if break_chars > (end - start) / 2 {
                    end = start + break_chars;
                }
            }
        }

        let text = &body[boundaries[start]..boundaries[end]];
        chunks.push(make_chunk(
            &document.relative_path,
            chunk_index,
            start as i64,
            text,
        ));
        chunk_index += 1;

        if end == total_chars {
            break;
        }

        let next = end.saturating_sub(overlap_chars);
        // Always advance, even if a break landed inside the overlap region.
        start = if next > start { next } else { start + 1 };
    }

    chunks
}

/// Split a whole corpus. Chunks are grouped per document, in document
/// order; no chunk ever spans two documents.
pub fn split_documents(
    documents: &[Document],
    max_chars: usize,
    overlap_chars: usize,
) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| split_document(doc, max_chars, overlap_chars))
        .collect()
}

fn make_chunk(document_id: &str, index: i64, start_offset: i64, text: &str) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    Chunk {
        id: Uuid::new_v4().to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        start_offset,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document {
            relative_path: "doc1.txt".to_string(),
            body: body.to_string(),
        }
    }

    fn char_count(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_short_document_single_chunk() {
        let chunks = split_document(&doc("Hello, world!"), 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
    }

    #[test]
    fn test_document_exactly_max_single_chunk() {
        let body = "x".repeat(100);
        let chunks = split_document(&doc(&body), 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, body);
    }

    #[test]
    fn test_empty_document_single_empty_chunk() {
        let chunks = split_document(&doc(""), 100, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
        assert_eq!(chunks[0].start_offset, 0);
    }

    #[test]
    fn test_no_chunk_exceeds_max() {
        let body = "abcdefghij".repeat(50); // 500 chars, no breaks
        let chunks = split_document(&doc(&body), 120, 20);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(char_count(&c.text) <= 120, "chunk too long: {}", c.text.len());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap_exactly() {
        // No paragraph breaks, so the heuristic never fires and the
        // overlap is exact for every pair except after the final chunk.
        let body = "abcdefghij".repeat(50);
        let chunks = split_document(&doc(&body), 120, 20);

        for pair in chunks.windows(2) {
            let prev_end = pair[0].start_offset + char_count(&pair[0].text) as i64;
            assert_eq!(pair[1].start_offset, prev_end - 20);

            let prev_tail: String = pair[0].text.chars().skip(char_count(&pair[0].text) - 20).collect();
            let next_head: String = pair[1].text.chars().take(20).collect();
            assert_eq!(prev_tail, next_head);
        }
    }

    #[test]
    fn test_start_offsets_point_into_source() {
        let body = "0123456789".repeat(30);
        let chunks = split_document(&doc(&body), 70, 15);
        for c in &chunks {
            let from_source: String = body
                .chars()
                .skip(c.start_offset as usize)
                .take(char_count(&c.text))
                .collect();
            assert_eq!(from_source, c.text);
        }
    }

    #[test]
    fn test_prefers_paragraph_break_in_second_half() {
        // Break at char 80 of a 100-char window: the first chunk should
        // end right before the "\n\n".
        let body = format!("{}\n\n{}", "a".repeat(80), "b".repeat(200));
        let chunks = split_document(&doc(&body), 100, 10);
        assert_eq!(chunks[0].text, "a".repeat(80));
    }

    #[test]
    fn test_ignores_paragraph_break_in_first_half() {
        let body = format!("{}\n\n{}", "a".repeat(20), "b".repeat(300));
        let chunks = split_document(&doc(&body), 100, 10);
        // Break at char 20 is in the first half; the window stays full size.
        assert_eq!(char_count(&chunks[0].text), 100);
    }

    #[test]
    fn test_multibyte_input_is_char_safe() {
        let body = "é".repeat(250) + "\n\n" + &"ü".repeat(250);
        let chunks = split_document(&doc(&body), 100, 10);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(char_count(&c.text) <= 100);
        }
        // Full coverage: last chunk reaches the end of the body.
        let last = chunks.last().unwrap();
        let end = last.start_offset as usize + char_count(&last.text);
        assert_eq!(end, char_count(&body));
    }

    #[test]
    fn test_deterministic() {
        let body = "The quick brown fox. ".repeat(40);
        let a = split_document(&doc(&body), 90, 15);
        let b = split_document(&doc(&body), 90, 15);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.text, y.text);
            assert_eq!(x.start_offset, y.start_offset);
            assert_eq!(x.hash, y.hash);
        }
    }

    #[test]
    fn test_chunk_indices_contiguous_per_document() {
        let body = "word ".repeat(200);
        let chunks = split_document(&doc(&body), 80, 10);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.document_id, "doc1.txt");
        }
    }

    #[test]
    fn test_no_chunk_crosses_documents() {
        let docs = vec![doc(&"a".repeat(150)), {
            Document {
                relative_path: "doc2.txt".to_string(),
                body: "b".repeat(150),
            }
        }];
        let chunks = split_documents(&docs, 100, 10);
        for c in &chunks {
            assert!(!c.text.contains('a') || !c.text.contains('b'));
        }
        assert!(chunks.iter().any(|c| c.document_id == "doc1.txt"));
        assert!(chunks.iter().any(|c| c.document_id == "doc2.txt"));
    }
}
