//! Context assembly: retrieved chunks → one grounded prompt block.

use crate::models::QueryMatch;

const DELIMITER_WIDTH: usize = 80;

/// Format retrieved chunks into a single context string, interleaving
/// each chunk's provenance header with its text. Deterministic and
/// order-preserving.
pub fn assemble_context(matches: &[QueryMatch]) -> String {
    let mut out = String::from("=== RETRIEVED DOCUMENTATION CONTEXT ===\n\n");

    for m in matches {
        out.push_str(&format!(
            "[Source: {}, Chunk {}/{}]\n",
            m.metadata.source,
            m.metadata.chunk_index + 1,
            m.metadata.total_chunks
        ));
        out.push_str(&m.text);
        out.push_str("\n\n");
        out.push_str(&"-".repeat(DELIMITER_WIDTH));
        out.push_str("\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, DocKind};

    fn hit(source: &str, index: i64, total: i64, text: &str) -> QueryMatch {
        QueryMatch {
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: index,
                doc_kind: DocKind::Text,
                total_chunks: total,
            },
            distance: 0.0,
        }
    }

    #[test]
    fn test_headers_use_one_based_positions() {
        let context = assemble_context(&[hit("guide.md", 0, 3, "Login requires an email.")]);
        assert!(context.contains("[Source: guide.md, Chunk 1/3]"));
        assert!(context.contains("Login requires an email."));
    }

    #[test]
    fn test_preserves_input_order() {
        let context = assemble_context(&[
            hit("a.md", 0, 1, "first"),
            hit("b.md", 0, 1, "second"),
        ]);
        let first = context.find("first").unwrap();
        let second = context.find("second").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_empty_input_is_just_the_banner() {
        let context = assemble_context(&[]);
        assert_eq!(context, "=== RETRIEVED DOCUMENTATION CONTEXT ===\n\n");
    }
}
