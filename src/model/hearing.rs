use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerModality {
    #[serde(alias = "single_choice", alias = "radio")]
    Single,
    #[serde(alias = "multi_choice", alias = "multiple", alias = "checkbox")]
    Multi,
    #[default]
    #[serde(alias = "free_text", alias = "free")]
    Text,
}

/// One question of the hearing. Never mutated once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HearingQuestion {
    pub id: String,
    #[serde(alias = "question", alias = "text")]
    pub label: String,
    #[serde(rename = "type", alias = "modality", default)]
    pub modality: AnswerModality,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub allow_free_text: bool,
}

impl HearingQuestion {
    pub fn free_text(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            modality: AnswerModality::Text,
            options: Vec::new(),
            note: None,
            allow_free_text: true,
        }
    }

    /// Choice questions without options cannot be answered; degrade them to free text.
    pub fn normalized(mut self) -> Self {
        self.options.retain(|o| !o.trim().is_empty());
        if self.modality != AnswerModality::Text && self.options.is_empty() {
            self.modality = AnswerModality::Text;
            self.allow_free_text = true;
        }
        if self.modality == AnswerModality::Text {
            self.options.clear();
            self.allow_free_text = true;
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "AnswerRepr")]
pub struct Answer {
    pub selected: Vec<String>,
    pub free_text: String,
}

/// Older clients send the answer as a bare string.
#[derive(Deserialize)]
#[serde(untagged)]
enum AnswerRepr {
    Text(String),
    Full {
        #[serde(default)]
        selected: Vec<String>,
        #[serde(default, rename = "freeText", alias = "free_text", alias = "text")]
        free_text: String,
    },
}

impl From<AnswerRepr> for Answer {
    fn from(repr: AnswerRepr) -> Self {
        match repr {
            AnswerRepr::Text(free_text) => Answer {
                selected: Vec::new(),
                free_text,
            },
            AnswerRepr::Full {
                selected,
                free_text,
            } => Answer {
                selected,
                free_text,
            },
        }
    }
}

impl Answer {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty() && self.free_text.trim().is_empty()
    }

    /// `A、B（補足: ...）` style rendering used in prompts and reports.
    pub fn display(&self) -> String {
        let chosen = self.selected.join("、");
        let extra = self.free_text.trim();

        match (chosen.is_empty(), extra.is_empty()) {
            (true, true) => "（回答なし）".to_string(),
            (false, true) => chosen,
            (true, false) => extra.to_string(),
            (false, false) => format!("{}（補足: {}）", chosen, extra),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaExchange {
    #[serde(alias = "id")]
    pub question_id: String,
    #[serde(alias = "question", alias = "label")]
    pub question_label: String,
    #[serde(default)]
    pub answer: Answer,
}

/// Ordered record of every accepted answer in one hearing.
///
/// Entries can only be appended; the whole log is dropped by `clear` on reset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QaLog(Vec<QaExchange>);

impl QaLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, exchange: QaExchange) {
        self.0.push(exchange);
    }

    pub fn entries(&self) -> &[QaExchange] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<Vec<QaExchange>> for QaLog {
    fn from(entries: Vec<QaExchange>) -> Self {
        Self(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_without_options_degrades_to_free_text() {
        let q = HearingQuestion {
            id: "q1".into(),
            label: "痛みの程度は？".into(),
            modality: AnswerModality::Single,
            options: vec!["  ".into()],
            note: None,
            allow_free_text: false,
        }
        .normalized();

        assert_eq!(q.modality, AnswerModality::Text);
        assert!(q.allow_free_text);
        assert!(q.options.is_empty());
    }

    #[test]
    fn question_decodes_model_shaped_json() {
        let q: HearingQuestion = serde_json::from_str(
            r#"{"id":"q2","question":"受診の有無","type":"single_choice","options":["あり","なし"],"allowFreeText":true}"#,
        )
        .unwrap();
        assert_eq!(q.label, "受診の有無");
        assert_eq!(q.modality, AnswerModality::Single);
        assert_eq!(q.options.len(), 2);
    }

    #[test]
    fn answer_display_combines_choice_and_note() {
        let a = Answer {
            selected: vec!["右膝".into(), "腫れあり".into()],
            free_text: " 熱感なし ".into(),
        };
        assert_eq!(a.display(), "右膝、腫れあり（補足: 熱感なし）");
        assert_eq!(Answer::default().display(), "（回答なし）");
    }

    #[test]
    fn legacy_string_answers_decode() {
        let log: QaLog = serde_json::from_str(
            r#"[{"question":"受診は？","id":"q1","answer":"まだ"},
                {"questionId":"q2","questionLabel":"痛みは？","answer":{"selected":["あり"],"freeText":"右膝"}}]"#,
        )
        .unwrap();
        assert_eq!(log.entries()[0].answer.free_text, "まだ");
        assert_eq!(log.entries()[1].answer.selected, ["あり"]);
        assert_eq!(log.entries()[1].answer.free_text, "右膝");
    }

    #[test]
    fn log_keeps_append_order() {
        let mut log = QaLog::new();
        for i in 1..=3 {
            log.push(QaExchange {
                question_id: format!("q{i}"),
                question_label: format!("質問{i}"),
                answer: Answer {
                    selected: vec![],
                    free_text: format!("A{i}"),
                },
            });
        }

        let ids: Vec<&str> = log.entries().iter().map(|e| e.question_id.as_str()).collect();
        assert_eq!(ids, ["q1", "q2", "q3"]);

        let json = serde_json::to_value(&log).unwrap();
        assert!(json.is_array());
    }
}
