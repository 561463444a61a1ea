//! One function per protocol step: validate, render the prompt, call the gateway,
//! parse what came back. Only `next_question` may call twice, when the first reply
//! re-asks known information.

use regex::Regex;
use std::sync::OnceLock;

use crate::engine::llm_client::{CompletionGateway, CompletionOptions, GatewayError};
use crate::engine::prompt_builder::{
    build_prompt, PromptError, PromptKind, PromptPayload, DOCTOR_END, DOCTOR_START,
    MAX_HEARING_QUESTIONS, SHORT_END, SHORT_START,
};
use crate::engine::response_parser::{
    extract_delimited_section, extract_labeled_section, extract_score, parse_structured_json,
    strip_delimited_section, ParseError,
};
use crate::model::category::resolve_category;
use crate::model::evaluation::EvaluationResult;
use crate::model::flow::{
    BuildReportResponse, ClassifyResponse, FlowKind, FlowRequest, FlowResponse,
    NextQuestionResponse, QuestionsResponse,
};
use crate::model::hearing::{HearingQuestion, QaLog};
use crate::model::llm_decode::{
    decode_classification, decode_next_question, decode_questions, NextQuestionReply,
};
use crate::model::report::BasicInfo;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] PromptError),
    #[error("server configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FlowError {
    pub fn is_validation(&self) -> bool {
        matches!(self, FlowError::Validation(_))
    }

    /// Short message for the person at the form; detail goes in `Display`.
    pub fn user_message(&self) -> &'static str {
        match self {
            FlowError::Validation(_) => "必須項目が入力されていません。",
            FlowError::Configuration(_) | FlowError::Gateway(GatewayError::Configuration(_)) => {
                "AIサービスを利用できません（設定エラー）。"
            }
            FlowError::Gateway(GatewayError::Timeout(_)) => "AIの応答がタイムアウトしました。もう一度お試しください。",
            FlowError::Gateway(_) => "AI評価中にサーバ側エラーが発生しました。",
            FlowError::Parse(_) => "AIの応答を解釈できませんでした。もう一度お試しください。",
        }
    }
}

/// Runs whichever step `req.flow` names.
pub fn run_flow(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<FlowResponse, FlowError> {
    tracing::debug!(flow = ?req.kind(), qa_entries = req.qa_log.len(), "dispatching flow");

    Ok(match req.kind() {
        FlowKind::ClassifyEvent => FlowResponse::Classify(classify_event(gateway, req)?),
        FlowKind::NextQuestion => FlowResponse::NextQuestion(next_question(gateway, req)?),
        FlowKind::GenerateQuestions => FlowResponse::Questions(generate_questions(gateway, req)?),
        FlowKind::BuildReport => FlowResponse::Report(build_report(gateway, req)?),
        FlowKind::FullEvaluate => FlowResponse::Evaluation(full_evaluate(gateway, req)?),
        FlowKind::Evaluate => FlowResponse::Evaluation(evaluate(gateway, req)?),
    })
}

fn payload_from(req: &FlowRequest) -> PromptPayload {
    PromptPayload {
        mode: req.mode.unwrap_or_default(),
        summary: req.summary.clone(),
        basic_info: req.basic_info.clone(),
        vital_text: req.effective_vital_text(),
        qa_log: req.qa_log.clone(),
        manual_category: req.manual_category,
        event_category: req.category_decision(),
        report_text: req.report_text.clone(),
        local_score: req.local_score,
        missing_required: req.missing_required.clone(),
        missing_optional: req.missing_optional.clone(),
        include_education: req.include_education,
        declined_questions: Vec::new(),
    }
}

fn complete(
    gateway: &dyn CompletionGateway,
    kind: PromptKind,
    payload: &PromptPayload,
) -> Result<String, FlowError> {
    let prompt = build_prompt(kind, payload)?;
    let options = CompletionOptions {
        temperature: kind.temperature(),
        shape: kind.output_shape(),
    };

    let raw = gateway.complete(&prompt.role_instructions, &prompt.user_content, &options)?;
    tracing::debug!(flow = kind.name(), reply_chars = raw.chars().count(), "completion received");
    Ok(raw)
}

pub fn classify_event(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<ClassifyResponse, FlowError> {
    // On this step a caller-supplied category is the staff's manual choice.
    let manual = req.manual_category.or(req.event_category);
    let mut payload = payload_from(req);
    payload.manual_category = manual;
    payload.event_category = None;

    let raw = complete(gateway, PromptKind::Classify, &payload)?;
    let decision = decode_classification(&parse_structured_json(&raw)?)?;

    let vitals = req.vitals.unwrap_or_default();
    let texts = [req.summary.as_str(), req.vital_text.as_str()];
    let resolved = resolve_category(manual, decision, &texts, &vitals);

    if resolved.safety_override {
        tracing::info!(category = resolved.category.wire_name(), "acute-event floor applied");
    }

    Ok(resolved.into())
}

pub fn next_question(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<NextQuestionResponse, FlowError> {
    if req.qa_log.len() >= MAX_HEARING_QUESTIONS {
        tracing::info!(asked = req.qa_log.len(), "question cap reached; hearing complete");
        return Ok(NextQuestionResponse {
            done: true,
            question: None,
        });
    }

    let mut payload = payload_from(req);

    let question = match ask_next(gateway, &payload)? {
        NextQuestionReply::Done => None,
        NextQuestionReply::Ask(question) if is_redundant(&question, &req.basic_info, &req.qa_log) => {
            tracing::warn!(id = %question.id, "model re-asked known information; asking once more");
            payload.declined_questions.push(question.label);

            match ask_next(gateway, &payload)? {
                NextQuestionReply::Done => None,
                NextQuestionReply::Ask(second) => {
                    if is_redundant(&second, &req.basic_info, &req.qa_log) {
                        tracing::warn!(id = %second.id, "second reply repeats known information too; passing it on");
                    }
                    Some(second)
                }
            }
        }
        NextQuestionReply::Ask(question) => Some(question),
    };

    Ok(NextQuestionResponse {
        done: question.is_none(),
        question,
    })
}

fn ask_next(gateway: &dyn CompletionGateway, payload: &PromptPayload) -> Result<NextQuestionReply, FlowError> {
    let raw = complete(gateway, PromptKind::NextQuestion, payload)?;
    Ok(decode_next_question(&parse_structured_json(&raw)?)?)
}

pub fn generate_questions(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<QuestionsResponse, FlowError> {
    let payload = payload_from(req);
    let raw = complete(gateway, PromptKind::GenerateQuestions, &payload)?;

    let questions = decode_questions(&parse_structured_json(&raw)?)?;
    if questions.is_empty() {
        return Err(ParseError::Unparsable {
            reason: "question list was empty".into(),
        }
        .into());
    }

    let before = questions.len();
    let questions: Vec<HearingQuestion> = questions
        .into_iter()
        .filter(|q| !is_redundant(q, &req.basic_info, &req.qa_log))
        .collect();

    if questions.is_empty() {
        return Err(ParseError::Unparsable {
            reason: "every question repeated known information".into(),
        }
        .into());
    }
    if questions.len() < before {
        tracing::warn!(dropped = before - questions.len(), "dropped questions about known information");
    }

    Ok(QuestionsResponse { questions })
}

pub fn build_report(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<BuildReportResponse, FlowError> {
    let payload = payload_from(req);
    let raw = complete(gateway, PromptKind::BuildReport, &payload)?;

    Ok(BuildReportResponse {
        report_text: strip_code_fence(&raw),
    })
}

pub fn full_evaluate(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<EvaluationResult, FlowError> {
    let payload = payload_from(req);
    let raw = complete(gateway, PromptKind::FullEvaluate, &payload)?;

    Ok(parse_evaluation(&raw, req.include_education, true))
}

/// Single-shot critique of a finished report. `mode` is mandatory here.
pub fn evaluate(gateway: &dyn CompletionGateway, req: &FlowRequest) -> Result<EvaluationResult, FlowError> {
    if req.mode.is_none() {
        return Err(PromptError::MissingRequiredField {
            field: "mode",
            flow: PromptKind::Evaluate.name(),
        }
        .into());
    }

    let payload = payload_from(req);
    let raw = complete(gateway, PromptKind::Evaluate, &payload)?;

    Ok(parse_evaluation(&raw, false, false))
}

/// Splits an evaluation reply into its sections. Missing sections come back empty.
pub fn parse_evaluation(text: &str, include_education: bool, include_doctor: bool) -> EvaluationResult {
    let ai_score = extract_score(text);

    let short_text = extract_delimited_section(text, SHORT_START, SHORT_END).unwrap_or_default();
    if short_text.is_empty() {
        tracing::warn!("evaluation reply had no short summary block");
    }
    let doctor_block = extract_delimited_section(text, DOCTOR_START, DOCTOR_END);

    let feedback_text = strip_delimited_section(
        &strip_delimited_section(text, SHORT_START, SHORT_END),
        DOCTOR_START,
        DOCTOR_END,
    );

    let rewrite_text = extract_labeled_section(&feedback_text, "⑤", "⑥").unwrap_or_default();

    let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };

    let education_text = if include_education {
        extract_labeled_section(&feedback_text, "⑦", "⑧").and_then(non_empty)
    } else {
        None
    };

    let doctor_text = if include_doctor {
        doctor_block
            .and_then(non_empty)
            .or_else(|| extract_labeled_section(&feedback_text, "⑧", "スコア").and_then(non_empty))
    } else {
        None
    };

    EvaluationResult {
        ai_score,
        feedback_text,
        rewrite_text,
        short_text,
        education_text,
        doctor_text,
    }
}

fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    // Drop an info string such as ```text on the opening line.
    let inner = match inner.split_once('\n') {
        Some((_, rest)) => rest,
        None => inner,
    };
    inner.trim_end().trim_end_matches("```").trim().to_string()
}

fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '？' | '?' | '。' | '、' | '.' | ',' | '！' | '!'))
        .collect::<String>()
        .to_lowercase()
}

struct BasicFieldPatterns {
    timestamp: Regex,
    location: Regex,
    subject: Regex,
}

fn basic_field_patterns() -> &'static BasicFieldPatterns {
    static PATTERNS: OnceLock<BasicFieldPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| BasicFieldPatterns {
        timestamp: Regex::new(
            r"(発生|起きた|起こった|出来事|事象|事故|転倒)[^？?。、]{0,4}(日時|日付|時刻|時間)|いつ(起き|発生|転倒)",
        )
        .expect("timestamp pattern is valid"),
        location: Regex::new(
            r"(発生|起きた|起こった|出来事|事象|事故|転倒)[^？?。、]{0,4}場所|どこで(起き|発生|転倒|見つか)",
        )
        .expect("location pattern is valid"),
        subject: Regex::new(
            r"(対象者|利用者|入居者)の?(氏名|名前|お名前)|対象者は(誰|どなた)|(誰|どなた)のこと",
        )
        .expect("subject pattern is valid"),
    })
}

/// True when a question only re-asks something already on record.
///
/// A question is dropped if its label repeats one from the log, or if it asks for the
/// event's own date/time, place, or subject while that basic field is already filled in.
/// Times and places of anything else (a body site, the last dose) are never dropped.
pub fn is_redundant(question: &HearingQuestion, info: &BasicInfo, log: &QaLog) -> bool {
    let label = normalize_label(&question.label);

    if log
        .entries()
        .iter()
        .any(|e| normalize_label(&e.question_label) == label)
    {
        return true;
    }

    let patterns = basic_field_patterns();
    (info.has_timestamp() && patterns.timestamp.is_match(&question.label))
        || (info.has_location() && patterns.location.is_match(&question.label))
        || (info.has_subject() && patterns.subject.is_match(&question.label))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::llm_client::testing::ScriptedGateway;
    use crate::engine::llm_client::OutputShape;
    use crate::model::category::EventCategory;
    use crate::model::hearing::{Answer, QaExchange};
    use crate::model::report::ReportMode;

    fn known_basics() -> BasicInfo {
        BasicInfo {
            author: "佐藤".into(),
            subject: "A様".into(),
            timestamp: "2026-10-19 14:00".into(),
            location: "食堂".into(),
        }
    }

    fn exchange(id: &str, label: &str, text: &str) -> QaExchange {
        QaExchange {
            question_id: id.into(),
            question_label: label.into(),
            answer: Answer {
                selected: Vec::new(),
                free_text: text.into(),
            },
        }
    }

    #[test]
    fn classify_fall_lands_on_acute_regardless_of_manual_choice() {
        let gateway = ScriptedGateway::new()
            .reply(r#"{"category":"social_routine","label":"生活・日常の出来事","reason":"食堂での出来事"}"#);

        let req = FlowRequest {
            flow: Some(FlowKind::ClassifyEvent),
            summary: "利用者が食堂で転倒し右膝を打撲".into(),
            manual_category: Some(EventCategory::SocialRoutine),
            ..Default::default()
        };

        let resp = classify_event(&gateway, &req).unwrap();
        assert_eq!(resp.event_category, EventCategory::AcuteEvent);
        assert!(resp.safety_override);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].role_instructions.is_empty());
        assert!(!calls[0].user_content.contains(&calls[0].role_instructions));
        assert_eq!(calls[0].options.shape, OutputShape::Json);
        assert_eq!(calls[0].options.temperature, 0.0);
    }

    #[test]
    fn classify_without_summary_is_validation_error() {
        let gateway = ScriptedGateway::new();
        let err = classify_event(&gateway, &FlowRequest::default()).unwrap_err();
        assert!(err.is_validation());
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn classify_garbage_is_parse_error() {
        let gateway = ScriptedGateway::new().reply("分類できませんでした");
        let req = FlowRequest {
            summary: "家族から電話".into(),
            ..Default::default()
        };
        assert!(matches!(classify_event(&gateway, &req), Err(FlowError::Parse(_))));
    }

    #[test]
    fn generated_questions_never_ask_for_known_basics() {
        let gateway = ScriptedGateway::new().reply(
            r#"{"questions":[
                {"id":"q1","label":"発生した日時を教えてください","type":"text"},
                {"id":"q2","label":"どこで転倒しましたか？","type":"text"},
                {"id":"q3","label":"対象者の氏名は？","type":"text"},
                {"id":"q4","label":"頭部を打っていますか？","type":"single","options":["はい","いいえ","不明"]}
            ]}"#,
        );

        let req = FlowRequest {
            flow: Some(FlowKind::GenerateQuestions),
            summary: "転倒".into(),
            basic_info: known_basics(),
            ..Default::default()
        };

        let resp = generate_questions(&gateway, &req).unwrap();
        let ids: Vec<&str> = resp.questions.iter().map(|q| q.id.as_str()).collect();
        assert_eq!(ids, ["q4"]);
    }

    #[test]
    fn basics_questions_kept_when_field_is_blank() {
        let q = HearingQuestion::free_text("q1", "発生した日時を教えてください");
        assert!(!is_redundant(&q, &BasicInfo::default(), &QaLog::new()));
        assert!(is_redundant(&q, &known_basics(), &QaLog::new()));
    }

    #[test]
    fn times_and_places_of_other_things_are_kept() {
        for label in [
            "痛みを訴えている場所はどこですか？",
            "最後に服薬した時刻は？",
            "前回の排便の日時は？",
            "腫れている場所を選んでください",
            "起き上がった時刻は？",
            "事故当時の服薬時刻は？",
        ] {
            let q = HearingQuestion::free_text("q1", label);
            assert!(!is_redundant(&q, &known_basics(), &QaLog::new()), "{label}");
        }

        for label in ["事故が起きた日時は？", "発生場所はどこですか？", "いつ転倒しましたか"] {
            let q = HearingQuestion::free_text("q1", label);
            assert!(is_redundant(&q, &known_basics(), &QaLog::new()), "{label}");
        }
    }

    #[test]
    fn body_site_question_keeps_the_hearing_going() {
        let gateway = ScriptedGateway::new().reply(
            r#"{"done":false,"question":{"id":"q2","label":"痛みを訴えている場所はどこですか？","type":"text"}}"#,
        );
        let req = FlowRequest {
            summary: "転倒".into(),
            basic_info: known_basics(),
            ..Default::default()
        };

        let resp = next_question(&gateway, &req).unwrap();
        assert!(!resp.done);
        assert_eq!(resp.question.unwrap().id, "q2");
        assert_eq!(gateway.calls().len(), 1);
    }

    #[test]
    fn repeated_question_is_asked_for_again_once() {
        let gateway = ScriptedGateway::new()
            .reply(r#"{"done":false,"question":{"id":"q9","label":"受診はしましたか?","type":"text"}}"#)
            .reply(r#"{"done":false,"question":{"id":"q10","label":"夜間の見守りは？","type":"text"}}"#);

        let mut log = QaLog::new();
        log.push(exchange("q1", "受診はしましたか？", "まだ"));

        let req = FlowRequest {
            flow: Some(FlowKind::NextQuestion),
            summary: "転倒".into(),
            qa_log: log,
            ..Default::default()
        };

        let resp = next_question(&gateway, &req).unwrap();
        assert!(!resp.done);
        assert_eq!(resp.question.unwrap().id, "q10");

        let calls = gateway.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].user_content.contains("【既に分かっているため聞かない質問】\n（なし）"));
        assert!(calls[1].user_content.contains("- 受診はしましたか?"));
    }

    #[test]
    fn second_repeat_is_passed_on_rather_than_ending() {
        let repeat = r#"{"done":false,"question":{"id":"q9","label":"発生した日時は？","type":"text"}}"#;
        let gateway = ScriptedGateway::new().reply(repeat).reply(repeat);
        let req = FlowRequest {
            summary: "転倒".into(),
            basic_info: known_basics(),
            ..Default::default()
        };

        let resp = next_question(&gateway, &req).unwrap();
        assert!(!resp.done);
        assert_eq!(resp.question.unwrap().id, "q9");
        assert_eq!(gateway.calls().len(), 2);
    }

    #[test]
    fn model_may_finish_instead_of_rephrasing() {
        let gateway = ScriptedGateway::new()
            .reply(r#"{"done":false,"question":{"id":"q9","label":"発生した日時は？","type":"text"}}"#)
            .reply(r#"{"done":true}"#);
        let req = FlowRequest {
            summary: "転倒".into(),
            basic_info: known_basics(),
            ..Default::default()
        };

        let resp = next_question(&gateway, &req).unwrap();
        assert!(resp.done);
        assert!(resp.question.is_none());
    }

    #[test]
    fn all_questions_redundant_is_a_parse_error() {
        let gateway = ScriptedGateway::new().reply(
            r#"{"questions":[
                {"id":"q1","label":"事故が起きた日時は？","type":"text"},
                {"id":"q2","label":"発生場所はどこですか？","type":"text"}
            ]}"#,
        );
        let req = FlowRequest {
            flow: Some(FlowKind::GenerateQuestions),
            summary: "転倒".into(),
            basic_info: known_basics(),
            ..Default::default()
        };

        let err = generate_questions(&gateway, &req).unwrap_err();
        assert!(matches!(
            err,
            FlowError::Parse(ParseError::Unparsable { ref reason }) if reason.contains("known information")
        ));
        assert!(!err.is_validation());
    }

    #[test]
    fn next_question_replays_whole_log() {
        let gateway = ScriptedGateway::new()
            .reply(r#"{"done":false,"question":{"id":"q4","label":"夜間の見守り体制は？","type":"text"}}"#);

        let mut log = QaLog::new();
        log.push(exchange("q1", "受診は？", "A1-なし"));
        log.push(exchange("q2", "痛みは？", "A2-軽度"));
        log.push(exchange("q3", "家族連絡は？", "A3-済"));

        let req = FlowRequest {
            flow: Some(FlowKind::NextQuestion),
            summary: "転倒".into(),
            qa_log: log,
            event_category: Some(EventCategory::AcuteEvent),
            ..Default::default()
        };

        let resp = next_question(&gateway, &req).unwrap();
        assert_eq!(resp.question.unwrap().id, "q4");

        let user = &gateway.calls()[0].user_content;
        let a1 = user.find("A1-なし").unwrap();
        let a2 = user.find("A2-軽度").unwrap();
        let a3 = user.find("A3-済").unwrap();
        assert!(a1 < a2 && a2 < a3);
        assert!(user.contains("事故・急変（acute_event）"));
    }

    #[test]
    fn question_cap_skips_the_model() {
        let gateway = ScriptedGateway::new();
        let mut log = QaLog::new();
        for i in 0..MAX_HEARING_QUESTIONS {
            log.push(exchange(&format!("q{i}"), &format!("質問{i}"), "回答"));
        }
        let req = FlowRequest {
            summary: "転倒".into(),
            qa_log: log,
            ..Default::default()
        };

        assert!(next_question(&gateway, &req).unwrap().done);
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn build_report_requires_qa_log() {
        let gateway = ScriptedGateway::new();
        let req = FlowRequest {
            flow: Some(FlowKind::BuildReport),
            summary: "転倒".into(),
            ..Default::default()
        };

        let err = build_report(&gateway, &req).unwrap_err();
        assert!(err.is_validation());
        assert!(gateway.calls().is_empty());
    }

    #[test]
    fn build_report_strips_code_fence() {
        let gateway = ScriptedGateway::new().reply("```text\n■ 概要\n・転倒\n```");
        let mut log = QaLog::new();
        log.push(exchange("q1", "受診は？", "なし"));
        let req = FlowRequest {
            summary: "転倒".into(),
            qa_log: log,
            ..Default::default()
        };

        assert_eq!(build_report(&gateway, &req).unwrap().report_text, "■ 概要\n・転倒");
    }

    const FULL_REPLY: &str = "① 総評\n概ね伝わります。\n\
② 曖昧表現\n- 「様子見」→ 観察項目を明記\n\
⑤ 専門的な書き直し例（全文）\n14:00 食堂にて転倒。右膝打撲。\n\
⑥ 夜勤・申し送り用の3行要約\n・転倒\n\
⑦ 教育・指導メモ\n- 時刻を分単位で書く\n\
⑧ 医師向けサマリー\n右膝打撲、腫脹軽度。\n\
スコア：105\n\
<<DOCTOR>>\n右膝打撲、腫脹軽度、BT 36.8℃。\n<<END_DOCTOR>>\n\
<<SHORT>>\n・食堂で転倒\n・右膝打撲\n・夜間観察\n<<END_SHORT>>";

    #[test]
    fn full_evaluation_sections() {
        let result = parse_evaluation(FULL_REPLY, true, true);

        assert_eq!(result.ai_score, Some(100));
        assert_eq!(result.short_text, "・食堂で転倒\n・右膝打撲\n・夜間観察");
        assert_eq!(result.rewrite_text, "14:00 食堂にて転倒。右膝打撲。");
        assert_eq!(result.education_text.as_deref(), Some("- 時刻を分単位で書く"));
        assert_eq!(result.doctor_text.as_deref(), Some("右膝打撲、腫脹軽度、BT 36.8℃。"));
        assert!(!result.feedback_text.contains(SHORT_START));
        assert!(!result.feedback_text.contains(DOCTOR_START));
        assert!(result.feedback_text.starts_with("① 総評"));
    }

    #[test]
    fn missing_short_block_leaves_rest_intact() {
        let reply = "① 総評\nよく書けています。\n⑤ 書き直し\n本文\n⑥ 要約\n・a\nScore: 78";
        let result = parse_evaluation(reply, false, false);

        assert_eq!(result.short_text, "");
        assert_eq!(result.ai_score, Some(78));
        assert_eq!(result.rewrite_text, "本文");
        assert!(result.feedback_text.contains("よく書けています。"));
        assert!(result.education_text.is_none());
        assert!(result.doctor_text.is_none());
    }

    #[test]
    fn single_shot_evaluate_needs_mode() {
        let gateway = ScriptedGateway::new().reply("スコア：70");
        let mut req = FlowRequest {
            report_text: "■ 概要\n・転倒".into(),
            ..Default::default()
        };

        assert!(evaluate(&gateway, &req).unwrap_err().is_validation());

        req.mode = Some(ReportMode::Report);
        assert_eq!(evaluate(&gateway, &req).unwrap().ai_score, Some(70));
    }

    #[test]
    fn gateway_failure_is_not_validation() {
        let gateway = ScriptedGateway::new().fail(GatewayError::Upstream {
            status: 429,
            detail: "rate limited".into(),
        });
        let req = FlowRequest {
            flow: Some(FlowKind::FullEvaluate),
            report_text: "x".into(),
            ..Default::default()
        };

        let err = run_flow(&gateway, &req).unwrap_err();
        assert!(matches!(err, FlowError::Gateway(GatewayError::Upstream { status: 429, .. })));
        assert_eq!(err.user_message(), "AI評価中にサーバ側エラーが発生しました。");
    }
}
