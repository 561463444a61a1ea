use crate::model::evaluation::LocalScore;
use crate::model::report::{ReportDraft, ReportMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Check {
    Summary,
    Details,
    Actions,
    Goal,
    Vital,
    Concern,
}

struct CheckRule {
    check: Check,
    required: bool,
    label: &'static str,
}

const REPORT_CHECKS: &[CheckRule] = &[
    CheckRule { check: Check::Summary, required: true, label: "概要" },
    CheckRule { check: Check::Details, required: true, label: "詳しい状況" },
    CheckRule { check: Check::Actions, required: false, label: "実施した対応" },
    CheckRule { check: Check::Goal, required: false, label: "今後の対応" },
    CheckRule { check: Check::Vital, required: false, label: "バイタル" },
    CheckRule { check: Check::Concern, required: false, label: "違和感" },
];

const INSTRUCTION_CHECKS: &[CheckRule] = &[
    CheckRule { check: Check::Summary, required: true, label: "指示の概要" },
    CheckRule { check: Check::Details, required: true, label: "背景・理由" },
    CheckRule { check: Check::Actions, required: true, label: "具体的な指示内容" },
    CheckRule { check: Check::Goal, required: true, label: "完了条件" },
];

const REQUIRED_PENALTY: i32 = 20;
const OPTIONAL_PENALTY: i32 = 8;
const FLOOR: i32 = 20;

fn is_filled(draft: &ReportDraft, check: Check) -> bool {
    let filled = |s: &str| !s.trim().is_empty();
    match check {
        Check::Summary => filled(&draft.summary),
        Check::Details => filled(&draft.details),
        Check::Actions => filled(&draft.actions),
        Check::Goal => filled(&draft.goal),
        Check::Vital => !draft.vitals.is_empty(),
        Check::Concern => filled(&draft.concern),
    }
}

fn level_for(score: u8, quick: bool) -> &'static str {
    match (score, quick) {
        (90..=100, false) => "ほぼ完成レベル",
        (90..=100, true) => "ほぼ完成レベル（クイック）",
        (75..=89, false) => "管理者が安心できるレベル",
        (75..=89, true) => "忙しいときの報告として十分",
        (60..=74, false) => "大枠OK。もう一歩深掘りしたい",
        (60..=74, true) => "要点は伝わるが、もう少し補足すると◎",
        _ => "重要な情報が不足している可能性あり",
    }
}

/// Completeness score of a fully written form.
pub fn evaluate_local(draft: &ReportDraft) -> LocalScore {
    let rules = match draft.mode {
        ReportMode::Report => REPORT_CHECKS,
        ReportMode::Instruction => INSTRUCTION_CHECKS,
    };

    let mut score = 100;
    let mut missing_required = Vec::new();
    let mut missing_optional = Vec::new();

    for rule in rules {
        if is_filled(draft, rule.check) {
            continue;
        }
        if rule.required {
            missing_required.push(rule.label.to_string());
            score -= REQUIRED_PENALTY;
        } else {
            missing_optional.push(rule.label.to_string());
            score -= OPTIONAL_PENALTY;
        }
    }

    let score = score.clamp(FLOOR, 100) as u8;

    LocalScore {
        score,
        level: level_for(score, false).to_string(),
        missing_required,
        missing_optional,
    }
}

/// Score for the quick memo path, where most fields are expected to be empty.
pub fn evaluate_quick(draft: &ReportDraft, bullets: &str) -> LocalScore {
    let mut score = 80;
    let mut missing_required = Vec::new();

    if draft.summary.trim().is_empty() && bullets.trim().is_empty() {
        missing_required.push("概要／要点".to_string());
        score -= REQUIRED_PENALTY;
    }
    if draft.basic_info.has_subject() {
        score += 5;
    }
    if draft.basic_info.has_timestamp() {
        score += 5;
    }

    let score = score.min(100) as u8;

    LocalScore {
        score,
        level: level_for(score, true).to_string(),
        missing_required,
        missing_optional: Vec::new(),
    }
}
