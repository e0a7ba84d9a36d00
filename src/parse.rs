//! Format adapters: raw file bytes → uniform [`DocumentRecord`]s.
//!
//! One adapter per supported extension (markdown/plain text, JSON, PDF,
//! HTML), dispatched by [`parse_document`]. Adapters never fail a batch:
//! malformed input of a recognized kind degrades to an error-kind record
//! whose `content` carries the diagnostic, and unrecognized extensions
//! fall back to a lossy UTF-8 decode tagged [`DocKind::Unknown`].
//!
//! The HTML adapter produces a retrieval-friendly digest (visible text,
//! form fields, buttons, element ids) and keeps the verbatim markup in
//! `raw_html` for later automation-script grounding.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

use crate::models::{DocKind, DocumentRecord};

/// How much raw HTML is appended to the digest for selector extraction.
const RAW_HTML_DIGEST_BYTES: usize = 5000;
/// Cap on elements listed in the KEY IDENTIFIERS section.
const MAX_IDENTIFIER_ELEMENTS: usize = 50;

/// Parse any supported document type into a uniform record.
///
/// The kind is derived from the filename extension unless `kind` names
/// one explicitly (e.g. `"json"`, `"html"`). This function never returns
/// an error; see the module docs for the degradation policy.
pub fn parse_document(bytes: &[u8], filename: &str, kind: Option<&str>) -> DocumentRecord {
    let ext = kind.map(|k| k.to_ascii_lowercase()).unwrap_or_else(|| {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase()
    });

    match ext.as_str() {
        "md" | "markdown" | "txt" => parse_text(bytes, filename),
        "json" => parse_json(bytes, filename),
        "pdf" => parse_pdf(bytes, filename),
        "html" | "htm" => parse_html(bytes, filename),
        _ => DocumentRecord {
            content: String::from_utf8_lossy(bytes).into_owned(),
            source: filename.to_string(),
            kind: DocKind::Unknown,
            raw_html: None,
        },
    }
}

/// Truncate to at most `max` bytes without splitting a UTF-8 sequence.
pub fn utf8_prefix(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn parse_text(bytes: &[u8], filename: &str) -> DocumentRecord {
    DocumentRecord {
        content: String::from_utf8_lossy(bytes).into_owned(),
        source: filename.to_string(),
        kind: DocKind::Text,
        raw_html: None,
    }
}

fn parse_json(bytes: &[u8], filename: &str) -> DocumentRecord {
    let raw = String::from_utf8_lossy(bytes);
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(value) => {
            let mut content = format!("JSON Document: {}\n\n", filename);
            format_json_value(&value, 0, &mut content);
            DocumentRecord {
                content,
                source: filename.to_string(),
                kind: DocKind::Json,
                raw_html: None,
            }
        }
        Err(e) => DocumentRecord {
            content: format!("Error parsing JSON: {}\n\nRaw content:\n{}", e, raw),
            source: filename.to_string(),
            kind: DocKind::JsonError,
            raw_html: None,
        },
    }
}

/// Flatten a JSON value into an indented key/value outline that embeds
/// well (raw JSON punctuation is poor retrieval text).
fn format_json_value(value: &serde_json::Value, indent: usize, out: &mut String) {
    let prefix = "  ".repeat(indent);
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map {
                if val.is_object() || val.is_array() {
                    out.push_str(&format!("{}{}:\n", prefix, key));
                    format_json_value(val, indent + 1, out);
                } else {
                    out.push_str(&format!("{}{}: {}\n", prefix, key, scalar_text(val)));
                }
            }
        }
        serde_json::Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if item.is_object() || item.is_array() {
                    out.push_str(&format!("{}[{}]:\n", prefix, i));
                    format_json_value(item, indent + 1, out);
                } else {
                    out.push_str(&format!("{}- {}\n", prefix, scalar_text(item)));
                }
            }
        }
        other => {
            out.push_str(&format!("{}{}\n", prefix, scalar_text(other)));
        }
    }
}

fn scalar_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_pdf(bytes: &[u8], filename: &str) -> DocumentRecord {
    match pdf_extract::extract_text_from_mem(bytes) {
        Ok(text) => DocumentRecord {
            content: text,
            source: filename.to_string(),
            kind: DocKind::Pdf,
            raw_html: None,
        },
        Err(e) => DocumentRecord {
            content: format!("Error parsing PDF: {}", e),
            source: filename.to_string(),
            kind: DocKind::PdfError,
            raw_html: None,
        },
    }
}

fn parse_html(bytes: &[u8], filename: &str) -> DocumentRecord {
    let raw = String::from_utf8_lossy(bytes).into_owned();
    match html_digest(&raw, filename) {
        Ok(content) => DocumentRecord {
            content,
            source: filename.to_string(),
            kind: DocKind::Html,
            raw_html: Some(raw),
        },
        Err(e) => DocumentRecord {
            content: format!("Error parsing HTML: {}\n\nRaw content:\n{}", e, raw),
            source: filename.to_string(),
            kind: DocKind::HtmlError,
            raw_html: None,
        },
    }
}

fn attr_value(tag: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    tag.attributes()
        .with_checks(false)
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn attr_or_na(tag: &BytesStart<'_>, name: &[u8]) -> String {
    attr_value(tag, name)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Build the searchable digest of an HTML page: title, visible text,
/// form fields, buttons, id-bearing elements, and a bounded raw-markup
/// prefix for selector extraction.
fn html_digest(html: &str, filename: &str) -> Result<String, quick_xml::Error> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.trim_text(true);

    let mut title = String::new();
    let mut text_parts: Vec<String> = Vec::new();
    let mut form_lines: Vec<String> = Vec::new();
    let mut button_lines: Vec<String> = Vec::new();
    let mut id_lines: Vec<String> = Vec::new();

    let mut in_title = false;
    let mut skip_depth = 0usize; // inside <script> or <style>
    let mut form_count = 0usize;
    let mut in_form = false;
    // (id, class, onclick, accumulated text) of the innermost open <button>
    let mut open_button: Option<(String, String, String, String)> = None;

    loop {
        let event = reader.read_event()?;
        match event {
            Event::Start(ref tag) | Event::Empty(ref tag) => {
                let is_start = matches!(event, Event::Start(_));
                let name = tag.local_name().as_ref().to_ascii_lowercase();

                // State toggles only apply to elements that will see a
                // matching end tag.
                if is_start {
                    match name.as_slice() {
                        b"script" | b"style" => skip_depth += 1,
                        b"title" => in_title = true,
                        b"form" => {
                            in_form = true;
                            form_count += 1;
                            form_lines.push(format!("\nForm {}:", form_count));
                        }
                        b"button" => {
                            open_button = Some((
                                attr_or_na(tag, b"id"),
                                attr_value(tag, b"class").unwrap_or_default(),
                                attr_or_na(tag, b"onclick"),
                                String::new(),
                            ));
                        }
                        _ => {}
                    }
                }

                if in_form && matches!(name.as_slice(), b"input" | b"textarea" | b"select" | b"button")
                {
                    form_lines.push(format!(
                        "  - {}: id='{}', name='{}', type='{}', class='{}'",
                        String::from_utf8_lossy(&name),
                        attr_or_na(tag, b"id"),
                        attr_or_na(tag, b"name"),
                        attr_or_na(tag, b"type"),
                        attr_value(tag, b"class").unwrap_or_default(),
                    ));
                }

                if id_lines.len() < MAX_IDENTIFIER_ELEMENTS {
                    if let Some(id) = attr_value(tag, b"id") {
                        id_lines.push(format!(
                            "  - {}#{} (class: {})",
                            String::from_utf8_lossy(&name),
                            id,
                            attr_value(tag, b"class").unwrap_or_default(),
                        ));
                    }
                }
            }
            Event::End(tag) => {
                let name = tag.local_name().as_ref().to_ascii_lowercase();
                match name.as_slice() {
                    b"script" | b"style" => skip_depth = skip_depth.saturating_sub(1),
                    b"title" => in_title = false,
                    b"form" => in_form = false,
                    b"button" => {
                        if let Some((id, class, onclick, text)) = open_button.take() {
                            button_lines.push(format!(
                                "  - Button: id='{}', class='{}', text='{}', onclick='{}'",
                                id,
                                class,
                                text.trim(),
                                onclick,
                            ));
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(t) => {
                if skip_depth > 0 {
                    continue;
                }
                let text = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(t.as_ref()).into_owned());
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if in_title {
                    title.push_str(text);
                }
                if let Some((_, _, _, btn_text)) = open_button.as_mut() {
                    if !btn_text.is_empty() {
                        btn_text.push(' ');
                    }
                    btn_text.push_str(text);
                }
                text_parts.push(text.to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let mut out = format!("HTML Document: {}\n", filename);
    out.push_str(&format!(
        "Title: {}\n\n",
        if title.is_empty() { "No title" } else { &title }
    ));
    out.push_str("=== TEXT CONTENT ===\n");
    out.push_str(&text_parts.join("\n"));

    if !form_lines.is_empty() {
        out.push_str("\n\n=== FORM ELEMENTS ===\n");
        out.push_str(&form_lines.join("\n"));
    }
    if !button_lines.is_empty() {
        out.push_str("\n\n=== BUTTONS ===\n");
        out.push_str(&button_lines.join("\n"));
    }
    if !id_lines.is_empty() {
        out.push_str("\n\n=== KEY IDENTIFIERS ===\n");
        out.push_str(&id_lines.join("\n"));
    }

    out.push_str("\n\n=== RAW HTML (for selector extraction) ===\n");
    out.push_str(utf8_prefix(html, RAW_HTML_DIGEST_BYTES));

    Ok(out)
}
