use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::backend::{BackendError, HearingBackend};
use crate::engine::local_score::evaluate_local;
use crate::engine::report_template::build_hearing_report_text;
use crate::model::category::{CategoryDecision, EventCategory};
use crate::model::evaluation::{EvaluationResult, LocalScore};
use crate::model::flow::{FlowKind, FlowRequest};
use crate::model::hearing::{Answer, HearingQuestion, QaExchange, QaLog};
use crate::model::report::ReportDraft;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HearingState {
    #[default]
    Idle,
    Classifying,
    FetchingNextQuestion,
    AwaitingAnswer,
    ReadyToBuild,
    Evaluating,
    Done,
    Error,
}

impl HearingState {
    pub fn label(self) -> &'static str {
        match self {
            HearingState::Idle => "未開始",
            HearingState::Classifying => "事象を分類中…",
            HearingState::FetchingNextQuestion => "次の質問を作成中…",
            HearingState::AwaitingAnswer => "回答待ち",
            HearingState::ReadyToBuild => "報告書を作成できます",
            HearingState::Evaluating => "報告書を作成・評価中…",
            HearingState::Done => "完了",
            HearingState::Error => "エラー",
        }
    }

    /// A backend call is in flight; the controller disables its inputs.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            HearingState::Classifying | HearingState::FetchingNextQuestion | HearingState::Evaluating
        )
    }
}

/// The step that last failed, replayed verbatim by `retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HearingStep {
    Classify,
    FetchNextQuestion,
    BuildAndEvaluate,
}

/// How the report body is produced before the full evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportAssembly {
    #[default]
    Generated,
    LocalTemplate,
}

#[derive(Debug, thiserror::Error)]
pub enum HearingError {
    #[error("cannot {action} while the hearing is {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: HearingState,
    },
    #[error("回答を選択または入力してください。")]
    EmptyAnswer,
    #[error("概要を入力してください。")]
    MissingSummary,
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Everything one hearing has accumulated.
#[derive(Debug, Clone, Default)]
pub struct HearingSession {
    pub draft: ReportDraft,
    pub manual_category: Option<EventCategory>,
    pub category: Option<CategoryDecision>,
    pub qa_log: QaLog,
    pub current_question: Option<HearingQuestion>,
    pub report_text: Option<String>,
    pub evaluation: Option<EvaluationResult>,
    pub state: HearingState,
    pub failed_step: Option<HearingStep>,
    pub last_error: Option<String>,
}

impl HearingSession {
    /// Drops everything the hearing gathered. The only place the QA log shrinks.
    fn clear(&mut self) {
        self.qa_log.clear();
        self.draft = ReportDraft::default();
        self.manual_category = None;
        self.category = None;
        self.current_question = None;
        self.report_text = None;
        self.evaluation = None;
        self.failed_step = None;
        self.last_error = None;
    }
}

type TransitionListener = Box<dyn FnMut(HearingState) + Send>;

pub struct HearingOrchestrator {
    backend: Box<dyn HearingBackend>,
    session: HearingSession,
    assembly: ReportAssembly,
    include_education: bool,
    on_transition: Option<TransitionListener>,
}

impl HearingOrchestrator {
    pub fn new(backend: Box<dyn HearingBackend>) -> Self {
        Self {
            backend,
            session: HearingSession::default(),
            assembly: ReportAssembly::default(),
            include_education: false,
            on_transition: None,
        }
    }

    pub fn with_listener(mut self, listener: impl FnMut(HearingState) + Send + 'static) -> Self {
        self.on_transition = Some(Box::new(listener));
        self
    }

    pub fn session(&self) -> &HearingSession {
        &self.session
    }

    pub fn state(&self) -> HearingState {
        self.session.state
    }

    pub fn set_backend(&mut self, backend: Box<dyn HearingBackend>) {
        self.backend = backend;
    }

    pub fn set_assembly(&mut self, assembly: ReportAssembly) {
        self.assembly = assembly;
    }

    pub fn set_include_education(&mut self, include: bool) {
        self.include_education = include;
    }

    /// Replaces the form snapshot without touching the hearing progress.
    pub fn update_draft(&mut self, draft: ReportDraft) {
        self.session.draft = draft;
    }

    fn transition(&mut self, next: HearingState) {
        if self.session.state != next {
            debug!(from = ?self.session.state, to = ?next, "hearing transition");
        }
        self.session.state = next;
        if let Some(listener) = self.on_transition.as_mut() {
            listener(next);
        }
    }

    fn fail(&mut self, step: HearingStep, err: BackendError) -> HearingError {
        warn!(?step, error = %err, detail = err.detail().unwrap_or(""), "hearing step failed");
        self.session.failed_step = Some(step);
        self.session.last_error = Some(err.to_string());
        self.transition(HearingState::Error);
        HearingError::Backend(err)
    }

    fn clear_failure(&mut self) {
        self.session.failed_step = None;
        self.session.last_error = None;
    }

    fn require(&self, action: &'static str, allowed: &[HearingState]) -> Result<(), HearingError> {
        if allowed.contains(&self.session.state) {
            Ok(())
        } else {
            Err(HearingError::InvalidTransition {
                action,
                state: self.session.state,
            })
        }
    }

    /// Summary plus the other free-text fields, so nothing typed is lost to the model.
    fn seed_text(&self) -> String {
        let draft = &self.session.draft;
        let mut seed = draft.summary.trim().to_string();
        if seed.is_empty() {
            return seed;
        }

        let mode = draft.mode;
        for (label, value) in [
            (mode.details_label(), &draft.details),
            (mode.actions_label(), &draft.actions),
            (mode.goal_label(), &draft.goal),
            ("職員として感じた違和感", &draft.concern),
        ] {
            let value = value.trim();
            if !value.is_empty() {
                seed.push_str(&format!("\n【{}】{}", label, value));
            }
        }
        seed
    }

    fn base_request(&self, flow: FlowKind) -> FlowRequest {
        let draft = &self.session.draft;
        let category = self.session.category.as_ref();

        FlowRequest {
            flow: Some(flow),
            mode: Some(draft.mode),
            summary: self.seed_text(),
            basic_info: draft.basic_info.clone(),
            vital_text: draft.vitals.vital_text(),
            vitals: Some(draft.vitals),
            qa_log: self.session.qa_log.clone(),
            manual_category: self.session.manual_category,
            event_category: category.map(|c| c.category),
            category_reason: category.map(|c| c.rationale.clone()).unwrap_or_default(),
            include_education: self.include_education,
            ..Default::default()
        }
    }

    /// Idle → Classifying → FetchingNextQuestion → AwaitingAnswer | ReadyToBuild.
    pub fn start(
        &mut self,
        draft: ReportDraft,
        manual_category: Option<EventCategory>,
    ) -> Result<(), HearingError> {
        self.require(
            "start a hearing",
            &[HearingState::Idle, HearingState::Error, HearingState::Done],
        )?;
        if draft.summary.trim().is_empty() {
            return Err(HearingError::MissingSummary);
        }

        let assembly = self.assembly;
        let include_education = self.include_education;
        self.session = HearingSession {
            draft,
            manual_category,
            ..Default::default()
        };
        self.assembly = assembly;
        self.include_education = include_education;

        info!(mode = self.session.draft.mode.name(), "hearing started");
        self.classify()
    }

    fn classify(&mut self) -> Result<(), HearingError> {
        self.clear_failure();
        self.transition(HearingState::Classifying);

        let req = self.base_request(FlowKind::ClassifyEvent);
        match self.backend.classify(&req) {
            Ok(resp) => {
                let decision = CategoryDecision::from(resp);
                info!(
                    category = decision.category.wire_name(),
                    safety_override = decision.safety_override,
                    "event classified"
                );
                self.session.category = Some(decision);
                self.fetch_next()
            }
            Err(err) => Err(self.fail(HearingStep::Classify, err)),
        }
    }

    fn fetch_next(&mut self) -> Result<(), HearingError> {
        self.clear_failure();
        self.transition(HearingState::FetchingNextQuestion);

        let req = self.base_request(FlowKind::NextQuestion);
        match self.backend.next_question(&req) {
            Ok(resp) => match (resp.done, resp.question) {
                (false, Some(question)) => {
                    self.session.current_question = Some(question);
                    self.transition(HearingState::AwaitingAnswer);
                    Ok(())
                }
                (true, _) => {
                    info!(answers = self.session.qa_log.len(), "hearing complete");
                    self.session.current_question = None;
                    self.transition(HearingState::ReadyToBuild);
                    Ok(())
                }
                (false, None) => Err(self.fail(
                    HearingStep::FetchNextQuestion,
                    BackendError::Unreadable {
                        message: "次の質問を取得できませんでした。".into(),
                        detail: Some("reply had neither a question nor done=true".into()),
                    },
                )),
            },
            Err(err) => Err(self.fail(HearingStep::FetchNextQuestion, err)),
        }
    }

    /// Appends the answer to the log, then fetches the next question.
    pub fn submit_answer(&mut self, answer: Answer) -> Result<(), HearingError> {
        self.require("answer", &[HearingState::AwaitingAnswer])?;
        if answer.is_empty() {
            return Err(HearingError::EmptyAnswer);
        }

        let Some(question) = self.session.current_question.take() else {
            return Err(HearingError::InvalidTransition {
                action: "answer without a question",
                state: self.session.state,
            });
        };

        self.session.qa_log.push(QaExchange {
            question_id: question.id,
            question_label: question.label,
            answer,
        });

        self.fetch_next()
    }

    /// Ends the hearing early; only possible while a question is pending.
    pub fn finish_early(&mut self) -> Result<(), HearingError> {
        self.require("finish the hearing", &[HearingState::AwaitingAnswer])?;
        self.session.current_question = None;
        self.transition(HearingState::ReadyToBuild);
        Ok(())
    }

    /// ReadyToBuild → Evaluating → Done. Never triggered automatically.
    pub fn build_report(&mut self) -> Result<(), HearingError> {
        self.require("build the report", &[HearingState::ReadyToBuild])?;
        self.build_and_evaluate()
    }

    fn build_and_evaluate(&mut self) -> Result<(), HearingError> {
        self.clear_failure();
        self.transition(HearingState::Evaluating);

        let report_text = match self.assembly {
            ReportAssembly::LocalTemplate => build_hearing_report_text(
                &self.session.draft,
                self.session.category.as_ref(),
                &self.session.qa_log,
            ),
            ReportAssembly::Generated => {
                let req = self.base_request(FlowKind::BuildReport);
                match self.backend.build_report(&req) {
                    Ok(resp) => resp.report_text,
                    Err(err) => return Err(self.fail(HearingStep::BuildAndEvaluate, err)),
                }
            }
        };
        self.session.report_text = Some(report_text.clone());

        let local = evaluate_local(&self.session.draft);
        let mut req = self.base_request(FlowKind::FullEvaluate);
        req.report_text = report_text;
        req.local_score = Some(local.score);
        req.missing_required = local.missing_required;
        req.missing_optional = local.missing_optional;

        match self.backend.full_evaluate(&req) {
            Ok(evaluation) => {
                info!(ai_score = ?evaluation.ai_score, "report evaluated");
                self.session.evaluation = Some(evaluation);
                self.transition(HearingState::Done);
                Ok(())
            }
            Err(err) => Err(self.fail(HearingStep::BuildAndEvaluate, err)),
        }
    }

    /// Replays the failed step; the QA log is left exactly as it was.
    pub fn retry(&mut self) -> Result<(), HearingError> {
        self.require("retry", &[HearingState::Error])?;

        match self.session.failed_step {
            Some(HearingStep::Classify) => self.classify(),
            Some(HearingStep::FetchNextQuestion) => self.fetch_next(),
            Some(HearingStep::BuildAndEvaluate) => self.build_and_evaluate(),
            None => Err(HearingError::InvalidTransition {
                action: "retry without a failed step",
                state: self.session.state,
            }),
        }
    }

    /// Drops the whole hearing, keeping only the backend settings.
    pub fn reset(&mut self) {
        info!(answered = self.session.qa_log.len(), "hearing reset");
        self.session.clear();
        self.transition(HearingState::Idle);
    }

    /// Single-shot critique of an already written report; hearing state is untouched.
    pub fn evaluate_report(
        &self,
        draft: &ReportDraft,
        report_text: String,
        local: LocalScore,
    ) -> Result<EvaluationResult, BackendError> {
        let req = FlowRequest {
            flow: Some(FlowKind::Evaluate),
            mode: Some(draft.mode),
            basic_info: draft.basic_info.clone(),
            vital_text: draft.vitals.vital_text(),
            report_text,
            local_score: Some(local.score),
            missing_required: local.missing_required,
            missing_optional: local.missing_optional,
            ..Default::default()
        };
        self.backend.evaluate(&req)
    }
}
