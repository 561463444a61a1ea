use std::fmt::Write as _;

use crate::model::category::CategoryDecision;
use crate::model::hearing::QaLog;
use crate::model::report::{ReportDraft, NOT_PROVIDED};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TemplateError {
    #[error("要点メモ（3〜5行）を入力してください。")]
    EmptyMemo,
    #[error("要点メモに有効な行がありません。")]
    NoValidLines,
}

fn or_placeholder(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        NOT_PROVIDED
    } else {
        value
    }
}

fn push_section(out: &mut String, heading: &str, body: &str) {
    let _ = write!(out, "■ {}\n・{}\n\n", heading, or_placeholder(body));
}

fn push_body(out: &mut String, draft: &ReportDraft) {
    let mode = draft.mode;
    let info = &draft.basic_info;

    push_section(out, mode.summary_label(), &draft.summary);

    out.push_str("■ 基本情報\n");
    let _ = writeln!(out, "・対象：{}", or_placeholder(&info.subject));
    let _ = writeln!(out, "・日時：{}", or_placeholder(&info.timestamp));
    let _ = writeln!(out, "・場所：{}", or_placeholder(&info.location));
    out.push('\n');

    push_section(out, mode.details_label(), &draft.details);
    push_section(out, "バイタル／数値情報", &draft.vitals.vital_text());
    push_section(out, mode.actions_label(), &draft.actions);
    push_section(out, mode.goal_label(), &draft.goal);
    push_section(out, "職員として感じた違和感", &draft.concern);
}

/// Fixed-heading report assembled from the form alone.
pub fn build_report_text(draft: &ReportDraft) -> String {
    let mut out = String::new();

    let _ = write!(out, "【モード】{}\n\n", draft.mode.name());
    push_body(&mut out, draft);

    out.push_str("■ 作成者\n");
    let _ = writeln!(out, "・{}", or_placeholder(&draft.basic_info.author));

    out
}

/// Same template with the hearing classification and every Q&A appended in log order.
pub fn build_hearing_report_text(
    draft: &ReportDraft,
    category: Option<&CategoryDecision>,
    qa_log: &QaLog,
) -> String {
    let mut out = String::new();

    let _ = write!(out, "【モード】{}（ヒアリングから構成）\n\n", draft.mode.name());

    if let Some(decision) = category {
        let _ = write!(out, "■ 事象分類\n・{}\n\n", decision.label);
    }

    push_body(&mut out, draft);

    out.push_str("■ ヒアリング内容\n");
    if qa_log.is_empty() {
        let _ = writeln!(out, "・{}", NOT_PROVIDED);
    }
    for exchange in qa_log.entries() {
        let _ = writeln!(out, "・Q: {}", exchange.question_label);
        let _ = writeln!(out, "  A: {}", exchange.answer.display());
    }
    out.push('\n');

    out.push_str("■ 作成者\n");
    let _ = writeln!(out, "・{}", or_placeholder(&draft.basic_info.author));

    out
}

/// Report built from a 3–5 line memo plus optional tags.
pub fn build_quick_report(draft: &ReportDraft, memo: &str, tags: &[String]) -> Result<String, TemplateError> {
    if memo.trim().is_empty() {
        return Err(TemplateError::EmptyMemo);
    }

    let bullets: Vec<&str> = memo
        .lines()
        .map(|line| line.trim().trim_start_matches('・').trim())
        .filter(|line| !line.is_empty())
        .collect();

    if bullets.is_empty() {
        return Err(TemplateError::NoValidLines);
    }

    let info = &draft.basic_info;
    let mut out = String::new();

    let _ = write!(out, "【モード】{}（かんたん入力から自動構成）\n\n", draft.mode.name());

    if !tags.is_empty() {
        let _ = write!(out, "■ カテゴリ・目的\n・{}\n\n", tags.join("／"));
    }

    out.push_str("■ 要点メモ（職員入力）\n");
    for bullet in &bullets {
        let _ = writeln!(out, "・{}", bullet);
    }
    out.push('\n');

    out.push_str("■ 参考情報（入力がある場合のみ使用）\n");
    if info.has_subject() {
        let _ = writeln!(out, "・対象者：{}", info.subject.trim());
    }
    if info.has_timestamp() {
        let _ = writeln!(out, "・日時：{}", info.timestamp.trim());
    }
    if info.has_location() {
        let _ = writeln!(out, "・場所：{}", info.location.trim());
    }
    if !info.has_subject() && !info.has_timestamp() && !info.has_location() {
        out.push_str("・（対象者・日時・場所は未入力）\n");
    }

    out.push_str("\n※この情報をもとに、管理者・看護師が読んで誤解なく伝わる文章に再構成してください。\n");

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::EventCategory;
    use crate::model::hearing::{Answer, QaExchange};
    use crate::model::report::ReportMode;

    #[test]
    fn empty_fields_render_placeholder() {
        let text = build_report_text(&ReportDraft::default());
        assert!(text.starts_with("【モード】共有・報告モード"));
        assert!(text.contains("■ 概要\n・（未入力）"));
        assert!(text.contains("・場所：（未入力）"));
        assert!(text.contains("■ バイタル／数値情報\n・（未入力）"));
    }

    #[test]
    fn instruction_mode_uses_its_own_headings() {
        let draft = ReportDraft {
            mode: ReportMode::Instruction,
            goal: "21時までに報告".into(),
            ..Default::default()
        };
        let text = build_report_text(&draft);
        assert!(text.contains("■ 完了条件・報告ライン\n・21時までに報告"));
    }

    #[test]
    fn hearing_report_lists_answers_in_order() {
        let mut log = QaLog::new();
        for (id, label, answer) in [("q1", "受診は？", "なし"), ("q2", "痛みは？", "軽度")] {
            log.push(QaExchange {
                question_id: id.into(),
                question_label: label.into(),
                answer: Answer {
                    selected: vec![answer.into()],
                    free_text: String::new(),
                },
            });
        }
        let decision = CategoryDecision {
            category: EventCategory::AcuteEvent,
            label: "事故・急変".into(),
            rationale: String::new(),
            safety_override: false,
        };

        let text = build_hearing_report_text(&ReportDraft::default(), Some(&decision), &log);
        let first = text.find("受診は？").unwrap();
        let second = text.find("痛みは？").unwrap();
        assert!(first < second);
        assert!(text.contains("■ 事象分類\n・事故・急変"));
    }

    #[test]
    fn quick_report_strips_bullets_and_rejects_blank_memo() {
        let mut draft = ReportDraft::default();
        draft.basic_info.subject = "B様".into();

        let text = build_quick_report(&draft, "・転倒あり\n\n・ 外傷なし ", &["事故".into()]).unwrap();
        assert!(text.contains("■ 要点メモ（職員入力）\n・転倒あり\n・外傷なし\n"));
        assert!(text.contains("■ カテゴリ・目的\n・事故"));
        assert!(text.contains("・対象者：B様"));

        assert_eq!(build_quick_report(&draft, "  ", &[]), Err(TemplateError::EmptyMemo));
        assert_eq!(build_quick_report(&draft, "・\n・", &[]), Err(TemplateError::NoValidLines));
    }
}
