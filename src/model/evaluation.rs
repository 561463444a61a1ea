use serde::{Deserialize, Serialize};

/// Final bundle returned by a full evaluation. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationResult {
    pub ai_score: Option<u8>,
    pub feedback_text: String,
    pub rewrite_text: String,
    pub short_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_text: Option<String>,
}

/// Offline completeness score computed from which fields were filled in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LocalScore {
    pub score: u8,
    pub level: String,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
}

impl LocalScore {
    /// `【必須】a／b` and `【追加すると良い】c` lines, as shown next to the score.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.missing_required.is_empty() {
            lines.push(format!("【必須】{}", self.missing_required.join("／")));
        }
        if !self.missing_optional.is_empty() {
            lines.push(format!("【追加すると良い】{}", self.missing_optional.join("／")));
        }
        lines
    }
}
