use crate::engine::orchestrator::{HearingState, ReportAssembly};
use crate::model::category::{CategoryDecision, EventCategory};
use crate::model::evaluation::{EvaluationResult, LocalScore};
use crate::model::hearing::{Answer, HearingQuestion, QaLog};
use crate::model::report::ReportDraft;

#[derive(Debug, Clone, PartialEq)]
pub enum BackendChoice {
    /// Call the generation service directly from this process.
    Local,
    /// Go through a `care-report serve` endpoint.
    Remote { endpoint: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub backend: BackendChoice,
    pub assembly: ReportAssembly,
    pub include_education: bool,
}

pub enum EngineCommand {
    StartHearing {
        draft: ReportDraft,
        manual_category: Option<EventCategory>,
    },
    SubmitAnswer(Answer),
    FinishHearing,
    UpdateDraft(ReportDraft),
    BuildReport,
    Retry,
    Reset,
    /// Critique a report the author wrote without a hearing.
    EvaluateDirect {
        draft: ReportDraft,
        report_text: String,
        local: LocalScore,
    },
    Configure(EngineSettings),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineResponse {
    StateChanged(HearingState),
    Classified(CategoryDecision),
    Question(HearingQuestion),
    Transcript(QaLog),
    HearingComplete,
    Evaluated {
        report_text: Option<String>,
        evaluation: EvaluationResult,
    },
    Failed {
        message: String,
        detail: Option<String>,
        retryable: bool,
    },
}
