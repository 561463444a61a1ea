//! Request and response bodies exchanged with the report endpoint.

use serde::{Deserialize, Serialize};

use crate::model::category::{CategoryDecision, EventCategory};
use crate::model::evaluation::EvaluationResult;
use crate::model::hearing::{HearingQuestion, QaLog};
use crate::model::report::{BasicInfo, ReportMode, VitalSigns};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowKind {
    #[serde(alias = "classify")]
    ClassifyEvent,
    NextQuestion,
    #[serde(alias = "questions")]
    GenerateQuestions,
    BuildReport,
    #[serde(alias = "evaluateFull")]
    FullEvaluate,
    Evaluate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FlowRequest {
    /// Absent means the single-shot `evaluate` flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<ReportMode>,
    #[serde(alias = "seedText")]
    pub summary: String,
    pub basic_info: BasicInfo,
    pub vital_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vitals: Option<VitalSigns>,
    #[serde(alias = "dialogueQA")]
    pub qa_log: QaLog,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_category: Option<EventCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_category: Option<EventCategory>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub category_reason: String,
    pub report_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_score: Option<u8>,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
    pub include_education: bool,
}

impl FlowRequest {
    pub fn kind(&self) -> FlowKind {
        self.flow.unwrap_or(FlowKind::Evaluate)
    }

    /// Vital text as sent, or rendered from structured vitals when only those came.
    pub fn effective_vital_text(&self) -> String {
        if !self.vital_text.trim().is_empty() {
            return self.vital_text.trim().to_string();
        }
        self.vitals.map(|v| v.vital_text()).unwrap_or_default()
    }

    /// The decided category carried between hearing steps, if any.
    pub fn category_decision(&self) -> Option<CategoryDecision> {
        self.event_category.map(|category| CategoryDecision {
            category,
            label: category.label().to_string(),
            rationale: self.category_reason.clone(),
            safety_override: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyResponse {
    pub event_category: EventCategory,
    pub label: String,
    pub reason: String,
    #[serde(default)]
    pub safety_override: bool,
}

impl From<CategoryDecision> for ClassifyResponse {
    fn from(d: CategoryDecision) -> Self {
        Self {
            event_category: d.category,
            label: d.label,
            reason: d.rationale,
            safety_override: d.safety_override,
        }
    }
}

impl From<ClassifyResponse> for CategoryDecision {
    fn from(r: ClassifyResponse) -> Self {
        Self {
            category: r.event_category,
            label: r.label,
            rationale: r.reason,
            safety_override: r.safety_override,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestionResponse {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<HearingQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionsResponse {
    pub questions: Vec<HearingQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReportResponse {
    pub report_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowResponse {
    Classify(ClassifyResponse),
    NextQuestion(NextQuestionResponse),
    Questions(QuestionsResponse),
    Report(BuildReportResponse),
    Evaluation(EvaluationResult),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
