//! Core data models used throughout QA-Forge.
//!
//! These types represent the parsed documents, chunks, and query results
//! that flow through the ingestion and retrieval pipeline, plus the
//! structured records returned by the generation agents.

use serde::{Deserialize, Serialize};

/// Kind tag attached to a parsed document by the format adapters.
///
/// The `*Error` variants mark documents of a recognized kind whose parsing
/// failed; their `content` carries the diagnostic text so the rest of the
/// batch can proceed and the operator can see what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocKind {
    Text,
    Json,
    Pdf,
    Html,
    JsonError,
    PdfError,
    HtmlError,
    Unknown,
}

impl DocKind {
    /// Stable string form, used in stored chunk metadata and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocKind::Text => "text",
            DocKind::Json => "json",
            DocKind::Pdf => "pdf",
            DocKind::Html => "html",
            DocKind::JsonError => "json_error",
            DocKind::PdfError => "pdf_error",
            DocKind::HtmlError => "html_error",
            DocKind::Unknown => "unknown",
        }
    }

    /// Parse the stable string form back into a kind.
    ///
    /// Unrecognized values map to [`DocKind::Unknown`] so a store written
    /// by a newer version never fails to load.
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => DocKind::Text,
            "json" => DocKind::Json,
            "pdf" => DocKind::Pdf,
            "html" => DocKind::Html,
            "json_error" => DocKind::JsonError,
            "pdf_error" => DocKind::PdfError,
            "html_error" => DocKind::HtmlError,
            _ => DocKind::Unknown,
        }
    }
}

impl std::fmt::Display for DocKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform record produced by the format adapters.
///
/// `content` is always present: adapter failures are degraded into error
/// text here rather than propagated as errors.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub content: String,
    pub source: String,
    pub kind: DocKind,
    /// Verbatim HTML of the original file. Only set for [`DocKind::Html`]
    /// records; used later for automation-script grounding.
    pub raw_html: Option<String>,
}

/// A chunk of a document's content, the unit of embedding and retrieval.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Deterministic id: `{source}_chunk_{index}`.
    pub id: String,
    pub text: String,
    pub source: String,
    pub chunk_index: i64,
    pub doc_kind: DocKind,
    /// Sibling count at chunk-creation time. Never updated afterwards.
    pub total_chunks: i64,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Provenance metadata carried alongside each retrieved chunk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMetadata {
    pub source: String,
    pub chunk_index: i64,
    pub doc_kind: DocKind,
    pub total_chunks: i64,
}

/// Outcome of ingesting a single document.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub filename: String,
    pub kind: DocKind,
    pub chunks_created: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A single nearest-neighbor match from a knowledge-base query.
#[derive(Debug, Clone, Serialize)]
pub struct QueryMatch {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query vector. Smaller is closer.
    pub distance: f32,
}

/// Result of a knowledge-base query, ordered by ascending distance.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResults {
    pub matches: Vec<QueryMatch>,
    /// Set when the query short-circuited (e.g. empty knowledge base).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Knowledge-base counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KbStats {
    pub document_count: u64,
    pub chunk_count: u64,
    pub has_html: bool,
}

/// A test case as returned by the generative model.
///
/// Field-level correctness is the model's responsibility; every field
/// defaults so a sparsely-filled object still deserializes (the pipeline
/// performs gross shape checks only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub test_id: String,
    #[serde(default)]
    pub feature: String,
    #[serde(default)]
    pub test_scenario: String,
    /// `"positive"` or `"negative"`.
    #[serde(default)]
    pub test_type: String,
    #[serde(default)]
    pub preconditions: String,
    #[serde(default)]
    pub test_steps: Vec<String>,
    #[serde(default)]
    pub test_data: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub expected_result: String,
    /// Source filename this test case is grounded in.
    #[serde(default)]
    pub grounded_in: String,
}

/// Successful output of the test-case agent.
#[derive(Debug, Clone, Serialize)]
pub struct TestCaseReport {
    pub test_cases: Vec<TestCase>,
    pub query: String,
    /// De-duplicated sources available as context. This is the retrieved
    /// set, not the set the model actually cited per case.
    pub sources_used: Vec<String>,
}

/// Successful output of the script agent. The script text is opaque.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptResult {
    pub script: String,
    pub test_case_id: String,
    pub feature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            DocKind::Text,
            DocKind::Json,
            DocKind::Pdf,
            DocKind::Html,
            DocKind::JsonError,
            DocKind::PdfError,
            DocKind::HtmlError,
            DocKind::Unknown,
        ] {
            assert_eq!(DocKind::parse(kind.as_str()), kind);
        }
    }

    #[test]
    fn test_unrecognized_kind_maps_to_unknown() {
        assert_eq!(DocKind::parse("spreadsheet"), DocKind::Unknown);
    }

    #[test]
    fn test_sparse_test_case_deserializes() {
        let tc: TestCase =
            serde_json::from_str(r#"{"test_id": "TC-001", "feature": "Login"}"#).unwrap();
        assert_eq!(tc.test_id, "TC-001");
        assert!(tc.test_steps.is_empty());
        assert!(tc.grounded_in.is_empty());
    }
}
