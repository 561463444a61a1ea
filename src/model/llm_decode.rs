use serde::Deserialize;
use serde_json::Value;

use crate::engine::response_parser::ParseError;
use crate::model::category::{CategoryDecision, EventCategory};
use crate::model::hearing::HearingQuestion;

fn unparsable(reason: impl Into<String>) -> ParseError {
    ParseError::Unparsable {
        reason: reason.into(),
    }
}

#[derive(Deserialize)]
struct RawClassification {
    category: EventCategory,
    #[serde(default)]
    label: Option<String>,
    #[serde(default, alias = "rationale")]
    reason: Option<String>,
}

/// Decode `{ "category", "label"?, "reason"? }` into a category decision.
pub fn decode_classification(value: &Value) -> Result<CategoryDecision, ParseError> {
    let raw: RawClassification = serde_json::from_value(value.clone())
        .map_err(|e| unparsable(format!("classification: {}", e)))?;

    let label = raw
        .label
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| raw.category.label().to_string());

    Ok(CategoryDecision {
        category: raw.category,
        label,
        rationale: raw.reason.unwrap_or_default(),
        safety_override: false,
    })
}

/// Decode one question; items without an id get a positional one.
fn decode_question(item: &Value, index: usize) -> Option<HearingQuestion> {
    let mut item = item.clone();
    let obj = item.as_object_mut()?;

    let has_id = obj
        .get("id")
        .and_then(Value::as_str)
        .is_some_and(|id| !id.trim().is_empty());
    if !has_id {
        obj.insert("id".into(), Value::String(format!("q{}", index + 1)));
    }

    match serde_json::from_value::<HearingQuestion>(item) {
        Ok(q) if !q.label.trim().is_empty() => Some(q.normalized()),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(error = %e, index, "skipping malformed question");
            None
        }
    }
}

/// Decode `{ "questions": [...] }`. Malformed entries are skipped, not fatal.
pub fn decode_questions(value: &Value) -> Result<Vec<HearingQuestion>, ParseError> {
    let Some(items) = value.get("questions").and_then(Value::as_array) else {
        return Err(unparsable("questions must be a JSON array"));
    };

    Ok(items
        .iter()
        .enumerate()
        .filter_map(|(i, item)| decode_question(item, i))
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextQuestionReply {
    Ask(HearingQuestion),
    Done,
}

/// Decode a next-question reply.
///
/// Accepts `{ "done": true }`, `{ "done": false, "question": {...} }`, or a
/// `questions` array whose first entry is taken. An explicit `done: true` wins over
/// any question sent alongside it.
pub fn decode_next_question(value: &Value) -> Result<NextQuestionReply, ParseError> {
    if value.get("done").and_then(Value::as_bool) == Some(true) {
        return Ok(NextQuestionReply::Done);
    }

    if let Some(q) = value.get("question").filter(|q| q.is_object()) {
        if let Some(question) = decode_question(q, 0) {
            return Ok(NextQuestionReply::Ask(question));
        }
    }

    if let Some(items) = value.get("questions").and_then(Value::as_array) {
        if let Some(question) = items.iter().enumerate().find_map(|(i, q)| decode_question(q, i)) {
            return Ok(NextQuestionReply::Ask(question));
        }
    }

    Err(unparsable("reply had neither a question nor done=true"))
}
