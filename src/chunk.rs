//! Overlapping text chunker for the ingestion pipeline.
//!
//! Splits document content into fragments bounded by a configurable
//! maximum size, with a configured overlap carried between consecutive
//! chunks so context is not severed at a chunk boundary. Splitting
//! prefers the coarsest separator present — paragraph break, then line
//! break, then word break — and only hard-splits at character
//! boundaries when a run of text has no separators at all.
//!
//! Each chunk receives a deterministic id (`{source}_chunk_{index}`)
//! and a SHA-256 hash of its text.

use sha2::{Digest, Sha256};

use crate::models::{Chunk, DocumentRecord};

/// Default maximum chunk size in bytes.
pub const DEFAULT_MAX_BYTES: usize = 1000;
/// Default overlap between consecutive chunks in bytes.
pub const DEFAULT_OVERLAP_BYTES: usize = 200;

/// Separator cascade, coarsest first. Text with none of these is
/// hard-split at character boundaries.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Splits text into bounded, overlapping chunks.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_bytes: usize,
    overlap_bytes: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BYTES, DEFAULT_OVERLAP_BYTES)
    }
}

impl Chunker {
    /// Create a chunker. `overlap_bytes` is clamped below `max_bytes`.
    pub fn new(max_bytes: usize, overlap_bytes: usize) -> Self {
        let max_bytes = max_bytes.max(1);
        Self {
            max_bytes,
            overlap_bytes: overlap_bytes.min(max_bytes - 1),
        }
    }

    /// Split `text` into ordered chunks.
    ///
    /// # Guarantees
    ///
    /// - Empty input yields zero chunks (ingesting an empty document is
    ///   a no-op, not an error).
    /// - Input no longer than the maximum yields exactly one chunk equal
    ///   to the input.
    /// - Every chunk is at most `max_bytes` bytes.
    /// - Chunk order equals document order, and consecutive chunks share
    ///   up to `overlap_bytes` of trailing/leading context.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        if text.len() <= self.max_bytes {
            return vec![text.to_string()];
        }

        let mut fragments = Vec::new();
        self.fragment(text, 0, &mut fragments);
        self.assemble(&fragments)
    }

    /// Recursively break `text` into fragments no longer than
    /// `max_bytes`, preferring coarser separators. Separators stay
    /// attached to the preceding fragment, so concatenating the
    /// fragments reproduces `text` exactly.
    fn fragment<'a>(&self, text: &'a str, level: usize, out: &mut Vec<&'a str>) {
        if text.len() <= self.max_bytes {
            if !text.is_empty() {
                out.push(text);
            }
            return;
        }

        if let Some(sep) = SEPARATORS.get(level) {
            if text.contains(sep) {
                for piece in text.split_inclusive(sep) {
                    self.fragment(piece, level + 1, out);
                }
            } else {
                self.fragment(text, level + 1, out);
            }
            return;
        }

        // No separators left: hard split at char boundaries.
        let mut rest = text;
        while rest.len() > self.max_bytes {
            let mut cut = snap_to_char_boundary(rest, self.max_bytes);
            if cut == 0 {
                // A single char wider than max_bytes; take it whole.
                cut = rest
                    .char_indices()
                    .nth(1)
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
            }
            out.push(&rest[..cut]);
            rest = &rest[cut..];
        }
        if !rest.is_empty() {
            out.push(rest);
        }
    }

    /// Greedily pack fragments into chunks, seeding each new chunk with
    /// the tail of the previous one to form the overlap.
    fn assemble(&self, fragments: &[&str]) -> Vec<String> {
        let mut chunks: Vec<String> = Vec::new();
        let mut current = String::new();

        for frag in fragments {
            if !current.is_empty() && current.len() + frag.len() > self.max_bytes {
                let seed = self.overlap_seed(&current, self.max_bytes.saturating_sub(frag.len()));
                chunks.push(std::mem::take(&mut current));
                current = seed;
            }
            current.push_str(frag);
        }
        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Tail of `chunk` used to start the next chunk. Bounded by both the
    /// configured overlap and the remaining `budget` so the next chunk
    /// never exceeds the maximum.
    fn overlap_seed(&self, chunk: &str, budget: usize) -> String {
        let want = self.overlap_bytes.min(budget);
        if want == 0 {
            return String::new();
        }
        if chunk.len() <= want {
            return chunk.to_string();
        }

        let mut start = chunk.len() - want;
        while start < chunk.len() && !chunk.is_char_boundary(start) {
            start += 1;
        }
        let window = &chunk[start..];

        // Avoid starting the overlap mid-word when possible.
        if let Some((pos, c)) = window.char_indices().find(|(_, c)| c.is_whitespace()) {
            let after = pos + c.len_utf8();
            if after < window.len() {
                return window[after..].trim_start().to_string();
            }
        }
        window.to_string()
    }
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Chunk a parsed document, attaching provenance metadata to each piece.
///
/// `total_chunks` is the sibling count at creation time and is never
/// updated afterwards.
pub fn chunk_document(record: &DocumentRecord, chunker: &Chunker) -> Vec<Chunk> {
    let pieces = chunker.split(&record.content);
    let total = pieces.len() as i64;

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            let hash = format!("{:x}", hasher.finalize());

            Chunk {
                id: format!("{}_chunk_{}", record.source, i),
                text,
                source: record.source.clone(),
                chunk_index: i as i64,
                doc_kind: record.kind,
                total_chunks: total,
                hash,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocKind;

    fn record(content: &str) -> DocumentRecord {
        DocumentRecord {
            content: content.to_string(),
            source: "doc.md".to_string(),
            kind: DocKind::Text,
            raw_html: None,
        }
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk_verbatim() {
        let chunker = Chunker::default();
        let chunks = chunker.split("Hello, world!");
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_text_at_limit_is_one_chunk() {
        let chunker = Chunker::new(100, 20);
        let text = "x".repeat(100);
        let chunks = chunker.split(&text);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_every_chunk_respects_max() {
        let chunker = Chunker::new(100, 20);
        let text = (0..200)
            .map(|i| format!("word{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 100, "chunk too long: {} bytes", c.len());
        }
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(600);
        let para_b = "b".repeat(600);
        let text = format!("{}\n\n{}", para_a, para_b);
        let chunker = Chunker::new(1000, 200);
        let chunks = chunker.split(&text);
        assert_eq!(chunks[0], para_a);
        assert!(chunks.last().unwrap().ends_with(&para_b));
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = (0..300)
            .map(|i| format!("token{:03}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunker = Chunker::new(200, 50);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            let head: String = pair[1].chars().take(20).collect();
            assert!(
                pair[0].contains(head.trim()),
                "no overlap between {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_no_content_lost_between_chunks() {
        let words: Vec<String> = (0..300).map(|i| format!("token{:03}", i)).collect();
        let text = words.join(" ");
        let chunker = Chunker::new(200, 50);
        let combined = chunker.split(&text).join(" ");
        for w in &words {
            assert!(combined.contains(w), "missing word {}", w);
        }
    }

    #[test]
    fn test_order_is_stable() {
        let text = (0..100)
            .map(|i| format!("paragraph number {:03}.", i))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunker = Chunker::new(120, 30);
        let chunks = chunker.split(&text);
        let combined = chunks.join("|");
        let mut last = 0;
        for i in 0..100 {
            let needle = format!("number {:03}", i);
            let pos = combined.find(&needle).unwrap();
            assert!(pos >= last || combined[..last].contains(&needle));
            last = last.max(pos);
        }
    }

    #[test]
    fn test_unbroken_run_hard_splits_on_char_boundary() {
        let text = "é".repeat(900); // 1800 bytes, no separators
        let chunker = Chunker::new(500, 100);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.len() <= 500);
            assert!(c.chars().all(|ch| ch == 'é'));
        }
    }

    #[test]
    fn test_chunk_document_metadata() {
        let rec = record("Hello world.");
        let chunks = chunk_document(&rec, &Chunker::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc.md_chunk_0");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
        assert_eq!(chunks[0].doc_kind, DocKind::Text);
        assert_eq!(chunks[0].source, "doc.md");
        assert!(!chunks[0].hash.is_empty());
    }

    #[test]
    fn test_chunk_document_indices_contiguous() {
        let long = (0..400)
            .map(|i| format!("sentence {}.", i))
            .collect::<Vec<_>>()
            .join(" ");
        let rec = record(&long);
        let chunks = chunk_document(&rec, &Chunker::new(200, 40));
        assert!(chunks.len() > 1);
        let total = chunks.len() as i64;
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i as i64);
            assert_eq!(c.total_chunks, total);
            assert_eq!(c.id, format!("doc.md_chunk_{}", i));
        }
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        let rec = record("");
        assert!(chunk_document(&rec, &Chunker::default()).is_empty());
    }
}
