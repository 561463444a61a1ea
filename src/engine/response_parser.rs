//! Tolerant extraction of structured fields from free-form model output.
//!
//! The model is asked to follow a format, nothing guarantees it does. Every extractor
//! here returns `None` when its field is missing; only [`parse_structured_json`] fails,
//! because a question list with nothing in it leaves the caller nothing to show.

use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("could not understand the model response: {reason}")]
    Unparsable { reason: String },
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:スコア|score)\s*[:：]\s*([0-9０-９]{1,9})")
            .expect("score pattern is valid")
    })
}

fn question_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*・]\s*)?(?:Q|Ｑ|質問)\s*([0-9０-９]+)\s*[:：.．)）]\s*(.+?)\s*$")
            .expect("question line pattern is valid")
    })
}

/// Maps full-width digits to ASCII so `スコア：８５` parses like `スコア：85`.
fn ascii_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Finds `Score: N` / `スコア：N` and clamps N to 0..=100.
pub fn extract_score(text: &str) -> Option<u8> {
    let caps = score_regex().captures(text)?;
    let digits = ascii_digits(caps.get(1)?.as_str());
    let value: u64 = digits.parse().ok()?;
    Some(value.min(100) as u8)
}

/// Text strictly between two sentinel markers, trimmed.
///
/// `None` when the start marker is absent. A missing end marker yields everything after
/// the start marker.
pub fn extract_delimited_section(text: &str, start_marker: &str, end_marker: &str) -> Option<String> {
    let start = text.find(start_marker)? + start_marker.len();
    let rest = &text[start..];

    let body = match rest.find(end_marker) {
        Some(end) => &rest[..end],
        None => rest,
    };

    Some(body.trim().to_string())
}

/// Removes a sentinel block (markers included). A dangling start marker removes the tail.
pub fn strip_delimited_section(text: &str, start_marker: &str, end_marker: &str) -> String {
    let Some(start) = text.find(start_marker) else {
        return text.trim().to_string();
    };

    let after = start + start_marker.len();
    let tail = match text[after..].find(end_marker) {
        Some(end) => &text[after + end + end_marker.len()..],
        None => "",
    };

    let mut out = String::with_capacity(text.len());
    out.push_str(text[..start].trim_end());
    if !tail.trim().is_empty() {
        out.push_str("\n\n");
        out.push_str(tail.trim_start());
    }
    out.trim().to_string()
}

/// Locates a heading line starting with `label`, ignoring markdown decoration.
/// Returns (byte offset of the line start, byte offset just past the line).
fn find_heading(text: &str, label: &str, from: usize) -> Option<(usize, usize)> {
    let mut offset = from;

    for line in text[from..].split_inclusive('\n') {
        let stripped = line.trim_start_matches(|c: char| c.is_whitespace() || matches!(c, '#' | '*' | '-' | '>' | '【'));
        if stripped.starts_with(label) {
            return Some((offset, offset + line.len()));
        }
        offset += line.len();
    }

    None
}

/// Content below the `from_label` heading up to the `to_label` heading, trimmed.
///
/// The rest of the heading line itself (e.g. `⑤ 専門的な書き直し例（全文）`) is skipped.
/// `None` when the start heading is absent; a missing end heading yields the remainder.
pub fn extract_labeled_section(text: &str, from_label: &str, to_label: &str) -> Option<String> {
    let (_, body_start) = find_heading(text, from_label, 0)?;

    let body_end = find_heading(text, to_label, body_start)
        .map(|(line_start, _)| line_start)
        .unwrap_or(text.len());

    Some(text[body_start..body_end].trim().to_string())
}

/// Parses the JSON object a model was asked to return.
///
/// Accepts prose or code fences around the object. When no JSON can be recovered,
/// falls back to `Q1: ...` lines and returns them as `{ "questions": [...] }`.
pub fn parse_structured_json(text: &str) -> Result<Value, ParseError> {
    let array_first = match (text.find('['), text.find('{')) {
        (Some(bracket), Some(brace)) => bracket < brace,
        (Some(_), None) => true,
        _ => false,
    };

    let recovered = if array_first {
        json_array_span(text).or_else(|| json_object_span(text))
    } else {
        json_object_span(text).or_else(|| json_array_span(text))
    };
    if let Some(value) = recovered {
        return Ok(value);
    }

    let questions = parse_question_lines(text);
    if !questions.is_empty() {
        tracing::warn!(count = questions.len(), "model reply was not JSON; recovered question lines");
        return Ok(json!({ "questions": questions }));
    }

    if text.trim().is_empty() {
        return Err(ParseError::Unparsable {
            reason: "empty response".to_string(),
        });
    }

    Err(ParseError::Unparsable {
        reason: "no JSON object or question lines found".to_string(),
    })
}

fn json_object_span(text: &str) -> Option<Value> {
    let open = text.find('{')?;
    let close = text.rfind('}')?;
    if open >= close {
        return None;
    }
    serde_json::from_str::<Value>(&text[open..=close])
        .ok()
        .filter(Value::is_object)
}

fn json_array_span(text: &str) -> Option<Value> {
    let open = text.find('[')?;
    let close = text.rfind(']')?;
    if open >= close {
        return None;
    }
    match serde_json::from_str::<Value>(&text[open..=close]).ok()? {
        Value::Array(items) => Some(json!({ "questions": items })),
        _ => None,
    }
}

fn parse_question_lines(text: &str) -> Vec<Value> {
    text.lines()
        .filter_map(|line| {
            let caps = question_line_regex().captures(line)?;
            let number = ascii_digits(caps.get(1)?.as_str());
            let label = caps.get(2)?.as_str();
            Some(json!({
                "id": format!("q{}", number),
                "label": label,
                "type": "text",
                "options": [],
                "allowFreeText": true,
            }))
        })
        .collect()
}
