//! Generation agents: retrieval-grounded test cases and Selenium scripts.
//!
//! Both agents follow the same three-stage contract: retrieve context
//! from the knowledge base (failing fast on an empty one), build a
//! fixed-template prompt that forbids facts absent from that context,
//! then call the generative model and validate the shape of its JSON
//! reply. Model output is untrusted input: a reply that is empty, not
//! JSON, or missing the expected top-level key becomes a typed
//! [`AgentError`], never a fabricated fallback.

use crate::context::assemble_context;
use crate::kb::KnowledgeBase;
use crate::llm::GenerativeModel;
use crate::models::{QueryMatch, ScriptResult, TestCase, TestCaseReport};
use crate::parse::utf8_prefix;

/// Scripts shorter than this are treated as a returned-empty sentinel.
pub const MIN_SCRIPT_CHARS: usize = 10;
/// Supplemental documentation chunks retrieved for script generation.
const SCRIPT_CONTEXT_CHUNKS: usize = 3;

/// Predictable failure modes of the generation agents.
#[derive(Debug)]
pub enum AgentError {
    /// Retrieval or generation requested before any successful ingestion.
    EmptyKnowledgeBase,
    /// Script generation requested with no HTML ever ingested.
    MissingMarkup,
    /// The model returned nothing.
    EmptyResponse,
    /// The model's reply was not the JSON shape it was asked for.
    MalformedResponse(String),
    /// The reply parsed but lacked the expected top-level key.
    MissingKey(&'static str),
    /// The returned script is too short to be a real script.
    ScriptTooShort(usize),
    /// The embedding or model provider itself failed.
    Provider(anyhow::Error),
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentError::EmptyKnowledgeBase => {
                write!(f, "Knowledge base is empty. Please ingest documents first.")
            }
            AgentError::MissingMarkup => write!(
                f,
                "No HTML content found in knowledge base. Please ingest an HTML file."
            ),
            AgentError::EmptyResponse => write!(f, "Empty response from model"),
            AgentError::MalformedResponse(detail) => {
                write!(f, "Failed to parse JSON response: {}", detail)
            }
            AgentError::MissingKey(key) => write!(f, "No '{}' found in JSON response", key),
            AgentError::ScriptTooShort(len) => {
                write!(f, "Generated script is too short ({} characters)", len)
            }
            AgentError::Provider(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AgentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AgentError::Provider(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Parse a model reply as a JSON object, mapping each failure mode to
/// its typed error.
fn parse_json_reply(raw: &str) -> Result<serde_json::Value, AgentError> {
    if raw.trim().is_empty() {
        return Err(AgentError::EmptyResponse);
    }
    serde_json::from_str(raw).map_err(|e| AgentError::MalformedResponse(e.to_string()))
}

/// Distinct sources across the retrieved chunks, first-seen order.
fn distinct_sources(matches: &[QueryMatch]) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for m in matches {
        if !sources.iter().any(|s| s == &m.metadata.source) {
            sources.push(m.metadata.source.clone());
        }
    }
    sources
}

// ============ Test-Case Agent ============

const TEST_CASE_SYSTEM: &str = "You are an expert QA engineer specializing in test case design. \
Generate comprehensive, documentation-grounded test cases. \
CRITICAL: You must ONLY generate test cases based on the provided documentation context. \
Do NOT hallucinate or invent features that are not mentioned in the context. \
Every test case must reference the source document it is based on. \
Respond with valid JSON only.";

/// Generates structured test cases grounded in retrieved documentation.
pub struct TestCaseAgent {
    model: Box<dyn GenerativeModel>,
}

impl TestCaseAgent {
    pub fn new(model: Box<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Generate test cases for `user_query`, grounding the model in the
    /// `n_context_chunks` nearest documentation chunks.
    pub async fn generate_test_cases(
        &self,
        kb: &KnowledgeBase,
        user_query: &str,
        n_context_chunks: usize,
    ) -> Result<TestCaseReport, AgentError> {
        if kb.stats().chunk_count == 0 {
            return Err(AgentError::EmptyKnowledgeBase);
        }

        let results = kb
            .query(user_query, n_context_chunks)
            .await
            .map_err(AgentError::Provider)?;

        let context = assemble_context(&results.matches);
        let prompt = build_test_case_prompt(user_query, &context);

        let raw = self
            .model
            .complete_json(TEST_CASE_SYSTEM, &prompt)
            .await
            .map_err(AgentError::Provider)?;

        let value = parse_json_reply(&raw)?;
        let cases = value
            .get("test_cases")
            .ok_or(AgentError::MissingKey("test_cases"))?;
        let test_cases: Vec<TestCase> = serde_json::from_value(cases.clone())
            .map_err(|e| AgentError::MalformedResponse(e.to_string()))?;

        Ok(TestCaseReport {
            test_cases,
            query: user_query.to_string(),
            sources_used: distinct_sources(&results.matches),
        })
    }
}

fn build_test_case_prompt(user_query: &str, context: &str) -> String {
    format!(
        r#"You are tasked with generating test cases for a web application based STRICTLY on the provided documentation.

USER REQUEST:
{user_query}

DOCUMENTATION CONTEXT:
{context}

INSTRUCTIONS:
1. Generate comprehensive test cases that cover the functionality described in the documentation
2. Include both positive (happy path) and negative (error) test cases
3. CRITICAL: Base ALL test cases ONLY on information found in the provided documentation context
4. Do NOT invent, assume, or hallucinate any features, behaviors, or requirements not explicitly mentioned
5. Each test case MUST reference the source document it is grounded in
6. Use the exact element IDs, names, and values mentioned in the documentation

OUTPUT FORMAT:
Respond with a JSON object in this exact structure:
{{
  "test_cases": [
    {{
      "test_id": "TC-001",
      "feature": "Feature name",
      "test_scenario": "Detailed test scenario description",
      "test_type": "positive or negative",
      "preconditions": "Any setup required before test",
      "test_steps": [
        "Step 1: ...",
        "Step 2: ...",
        "Step 3: ..."
      ],
      "test_data": {{
        "input_field": "value",
        "another_field": "value"
      }},
      "expected_result": "Expected outcome",
      "grounded_in": "source_document_name.ext"
    }}
  ]
}}

Generate 5-15 test cases covering different aspects of the requested functionality.
Ensure proper JSON formatting with no syntax errors.
"#
    )
}

// ============ Script Agent ============

const SCRIPT_SYSTEM: &str = "You are an expert Selenium (Python) automation engineer. \
Generate clean, runnable Selenium WebDriver scripts. \
CRITICAL: Use ONLY selectors that exist in the provided HTML. \
Do NOT invent or hallucinate element IDs, names, or CSS selectors. \
Include proper waits, error handling, and assertions. \
The code should be production-ready and follow best practices. \
Respond with valid JSON only, using this format: \
{\"script\": \"<python code here>\", \"description\": \"brief description\"}";

/// Generates a Selenium script for one test case, grounded in the
/// ingested page markup.
pub struct ScriptAgent {
    model: Box<dyn GenerativeModel>,
    /// Raw-markup prefix budget for the prompt, in bytes. Long pages
    /// are truncated, not chunked, which can omit elements located
    /// later in the document.
    markup_budget: usize,
}

impl ScriptAgent {
    pub fn new(model: Box<dyn GenerativeModel>, markup_budget: usize) -> Self {
        Self {
            model,
            markup_budget,
        }
    }

    /// Generate a Selenium script for `test_case`.
    ///
    /// Hard precondition: page markup must have been ingested. On
    /// violation the model is never invoked.
    pub async fn generate_script(
        &self,
        kb: &KnowledgeBase,
        test_case: &TestCase,
    ) -> Result<ScriptResult, AgentError> {
        let markup = kb.markup().ok_or(AgentError::MissingMarkup)?.to_string();
        if kb.stats().chunk_count == 0 {
            return Err(AgentError::EmptyKnowledgeBase);
        }

        // Supplement the markup with any narrative documentation that
        // describes this feature.
        let query = format!(
            "HTML elements for {} {}",
            test_case.feature,
            test_case.test_steps.join(" ")
        );
        let results = kb
            .query(&query, SCRIPT_CONTEXT_CHUNKS)
            .await
            .map_err(AgentError::Provider)?;
        let context = results
            .matches
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let snippet = utf8_prefix(&markup, self.markup_budget);
        let prompt = build_script_prompt(test_case, snippet, &context);

        let raw = self
            .model
            .complete_json(SCRIPT_SYSTEM, &prompt)
            .await
            .map_err(AgentError::Provider)?;

        let value = parse_json_reply(&raw)?;
        let script = value
            .get("script")
            .and_then(|s| s.as_str())
            .ok_or(AgentError::MissingKey("script"))?;

        if script.chars().count() < MIN_SCRIPT_CHARS {
            return Err(AgentError::ScriptTooShort(script.chars().count()));
        }

        Ok(ScriptResult {
            script: script.to_string(),
            test_case_id: non_empty_or(&test_case.test_id, "Unknown"),
            feature: non_empty_or(&test_case.feature, "Unknown"),
        })
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

fn build_script_prompt(test_case: &TestCase, markup: &str, context: &str) -> String {
    let test_data =
        serde_json::to_string_pretty(&test_case.test_data).unwrap_or_else(|_| "{}".to_string());

    format!(
        r#"Generate a complete, runnable Selenium Python script for the following test case.

TEST CASE:
Test ID: {test_id}
Feature: {feature}
Scenario: {scenario}
Type: {test_type}

Preconditions:
{preconditions}

Test Steps:
{steps}

Test Data:
{test_data}

Expected Result:
{expected}

HTML CONTENT (use this to identify correct selectors):
{markup}

DOCUMENTATION CONTEXT:
{context}

REQUIREMENTS:
1. Generate a complete Python script using Selenium WebDriver
2. Use the actual element IDs, names, and selectors from the HTML above
3. Include necessary imports (selenium, time, etc.)
4. Add explicit waits (WebDriverWait) instead of time.sleep where appropriate
5. Include assertions to verify expected results
6. Add comments explaining each major step
7. Use try-except for error handling where appropriate
8. The script should work with Chrome WebDriver
9. Include a main section to run the test

OUTPUT FORMAT:
Provide ONLY the Python code, no explanations before or after.
Use proper Python syntax and formatting.
Make the script immediately runnable.
"#,
        test_id = non_empty_or(&test_case.test_id, "N/A"),
        feature = non_empty_or(&test_case.feature, "N/A"),
        scenario = non_empty_or(&test_case.test_scenario, "N/A"),
        test_type = non_empty_or(&test_case.test_type, "N/A"),
        preconditions = non_empty_or(&test_case.preconditions, "None"),
        steps = test_case.test_steps.join("\n"),
        test_data = test_data,
        expected = non_empty_or(&test_case.expected_result, "N/A"),
        markup = markup,
        context = context,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChunkMetadata, DocKind};

    fn hit(source: &str) -> QueryMatch {
        QueryMatch {
            text: "text".to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: 0,
                doc_kind: DocKind::Text,
                total_chunks: 1,
            },
            distance: 0.0,
        }
    }

    #[test]
    fn test_parse_reply_rejects_empty() {
        assert!(matches!(
            parse_json_reply("  \n"),
            Err(AgentError::EmptyResponse)
        ));
    }

    #[test]
    fn test_parse_reply_rejects_non_json() {
        assert!(matches!(
            parse_json_reply("not valid json"),
            Err(AgentError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_reply_accepts_object() {
        let value = parse_json_reply(r#"{"test_cases": []}"#).unwrap();
        assert!(value.get("test_cases").is_some());
    }

    #[test]
    fn test_distinct_sources_preserves_first_seen_order() {
        let matches = vec![hit("b.md"), hit("a.md"), hit("b.md"), hit("a.md")];
        assert_eq!(distinct_sources(&matches), vec!["b.md", "a.md"]);
    }

    #[test]
    fn test_error_messages_are_diagnostic() {
        assert!(AgentError::MissingMarkup.to_string().contains("No HTML"));
        assert!(AgentError::ScriptTooShort(2).to_string().contains("too short"));
        assert!(AgentError::MissingKey("script").to_string().contains("'script'"));
        assert!(AgentError::EmptyKnowledgeBase
            .to_string()
            .contains("Knowledge base is empty"));
    }

    #[test]
    fn test_test_case_prompt_carries_grounding_constraint() {
        let prompt = build_test_case_prompt("login tests", "CONTEXT HERE");
        assert!(prompt.contains("USER REQUEST:\nlogin tests"));
        assert!(prompt.contains("CONTEXT HERE"));
        assert!(prompt.contains("Do NOT invent"));
        assert!(prompt.contains("\"grounded_in\""));
    }

    #[test]
    fn test_script_prompt_embeds_test_case_and_markup() {
        let tc = TestCase {
            test_id: "TC-007".to_string(),
            feature: "Checkout".to_string(),
            test_steps: vec!["Step 1: open page".to_string()],
            ..TestCase::default()
        };
        let prompt = build_script_prompt(&tc, "<form id='checkout'></form>", "docs context");
        assert!(prompt.contains("Test ID: TC-007"));
        assert!(prompt.contains("Feature: Checkout"));
        assert!(prompt.contains("Step 1: open page"));
        assert!(prompt.contains("<form id='checkout'></form>"));
        assert!(prompt.contains("docs context"));
    }
}
