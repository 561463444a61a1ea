use serde::{Deserialize, Serialize};

use crate::model::report::VitalSigns;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    #[serde(alias = "accident", alias = "acute", alias = "accident_or_acute_change")]
    AcuteEvent,
    #[serde(alias = "gradual")]
    GradualChange,
    #[serde(alias = "social", alias = "routine")]
    SocialRoutine,
    #[serde(alias = "logistics", alias = "operational_logistics")]
    Operational,
    #[default]
    #[serde(other)]
    Unclassified,
}

impl EventCategory {
    pub const ALL: [EventCategory; 5] = [
        EventCategory::AcuteEvent,
        EventCategory::GradualChange,
        EventCategory::SocialRoutine,
        EventCategory::Operational,
        EventCategory::Unclassified,
    ];

    pub fn label(self) -> &'static str {
        match self {
            EventCategory::AcuteEvent => "事故・急変",
            EventCategory::GradualChange => "徐々の変化",
            EventCategory::SocialRoutine => "生活・日常の出来事",
            EventCategory::Operational => "業務・運営",
            EventCategory::Unclassified => "未分類",
        }
    }

    pub fn wire_name(self) -> &'static str {
        match self {
            EventCategory::AcuteEvent => "acute_event",
            EventCategory::GradualChange => "gradual_change",
            EventCategory::SocialRoutine => "social_routine",
            EventCategory::Operational => "operational",
            EventCategory::Unclassified => "unclassified",
        }
    }

    /// One-line guidance for the model describing what belongs in the category.
    pub fn description(self) -> &'static str {
        match self {
            EventCategory::AcuteEvent => "転倒・転落・誤嚥・外傷・急な体調変化など、すぐに安全確認が必要な出来事",
            EventCategory::GradualChange => "食欲低下・活気低下・認知面の変化など、日単位・週単位の状態変化",
            EventCategory::SocialRoutine => "家族対応・レクリエーション・生活上の出来事など、安全に直結しない日常の報告",
            EventCategory::Operational => "物品・設備・勤務調整・連絡体制など、業務運営に関する報告",
            EventCategory::Unclassified => "上記のいずれにも当てはまらない",
        }
    }
}

/// A category decision with the model's stated reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDecision {
    pub category: EventCategory,
    pub label: String,
    pub rationale: String,
    /// True when the acute-event floor replaced whatever was chosen.
    #[serde(default)]
    pub safety_override: bool,
}

const HIGH_ACUITY_KEYWORDS: &[&str] = &[
    "転倒",
    "転落",
    "尻もち",
    "ずり落ち",
    "誤嚥",
    "窒息",
    "むせ込み",
    "胸痛",
    "胸の痛み",
    "出血",
    "吐血",
    "下血",
    "嘔吐",
    "吐いた",
    "意識レベル",
    "意識障害",
    "反応がない",
    "呼吸苦",
    "呼吸困難",
    "チアノーゼ",
    "SpO2低下",
    "サチュレーション低下",
    "酸素飽和度低下",
    "急変",
    "けいれん",
    "痙攣",
    "骨折",
    "fall",
    "fell",
    "chest pain",
    "bleeding",
    "vomit",
    "desaturation",
];

/// Returns the first recognised high-acuity keyword found in any of the texts.
pub fn find_high_acuity_keyword<'a, I>(texts: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a str>,
{
    let lowered: Vec<String> = texts.into_iter().map(|t| t.to_lowercase()).collect();

    HIGH_ACUITY_KEYWORDS.iter().copied().find(|kw| {
        let kw_lower = kw.to_lowercase();
        lowered.iter().any(|t| t.contains(&kw_lower))
    })
}

/// Final category for a hearing session.
///
/// High-acuity signals always land on [`EventCategory::AcuteEvent`], whatever the caller
/// or the model chose. Otherwise an explicit manual category wins over the model.
pub fn resolve_category(
    manual: Option<EventCategory>,
    classified: CategoryDecision,
    texts: &[&str],
    vitals: &VitalSigns,
) -> CategoryDecision {
    let keyword = find_high_acuity_keyword(texts.iter().copied());

    if keyword.is_some() || vitals.acute_swing() {
        if classified.category == EventCategory::AcuteEvent {
            return classified;
        }

        let reason = match keyword {
            Some(kw) => format!("高リスクのキーワード「{}」を含むため事故・急変として扱います。", kw),
            None => "バイタルサインに急な逸脱があるため事故・急変として扱います。".to_string(),
        };

        return CategoryDecision {
            category: EventCategory::AcuteEvent,
            label: EventCategory::AcuteEvent.label().to_string(),
            rationale: reason,
            safety_override: true,
        };
    }

    match manual {
        Some(category) if category != EventCategory::Unclassified => CategoryDecision {
            category,
            label: category.label().to_string(),
            rationale: "職員が選択した分類を使用します。".to_string(),
            safety_override: false,
        },
        _ => classified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_says(category: EventCategory) -> CategoryDecision {
        CategoryDecision {
            category,
            label: category.label().to_string(),
            rationale: "model".into(),
            safety_override: false,
        }
    }

    #[test]
    fn fall_forces_acute_even_against_manual_choice() {
        let decision = resolve_category(
            Some(EventCategory::SocialRoutine),
            model_says(EventCategory::GradualChange),
            &["利用者が食堂で転倒し右膝を打撲"],
            &VitalSigns::default(),
        );
        assert_eq!(decision.category, EventCategory::AcuteEvent);
        assert!(decision.safety_override);
        assert!(decision.rationale.contains("転倒"));
    }

    #[test]
    fn model_acute_choice_is_kept_verbatim() {
        let decision = resolve_category(
            None,
            model_says(EventCategory::AcuteEvent),
            &["夕食後に嘔吐あり"],
            &VitalSigns::default(),
        );
        assert_eq!(decision.rationale, "model");
        assert!(!decision.safety_override);
    }

    #[test]
    fn manual_category_respected_without_acuity_signals() {
        let decision = resolve_category(
            Some(EventCategory::Operational),
            model_says(EventCategory::SocialRoutine),
            &["リネン庫の在庫が不足している"],
            &VitalSigns::default(),
        );
        assert_eq!(decision.category, EventCategory::Operational);
    }

    #[test]
    fn vital_swing_alone_triggers_override() {
        let vitals = VitalSigns {
            spo2: Some(84),
            ..Default::default()
        };
        let decision = resolve_category(
            None,
            model_says(EventCategory::GradualChange),
            &["午後から元気がない"],
            &vitals,
        );
        assert_eq!(decision.category, EventCategory::AcuteEvent);
    }

    #[test]
    fn unknown_wire_name_decodes_as_unclassified() {
        let c: EventCategory = serde_json::from_str("\"something_else\"").unwrap();
        assert_eq!(c, EventCategory::Unclassified);

        let c: EventCategory = serde_json::from_str("\"accident\"").unwrap();
        assert_eq!(c, EventCategory::AcuteEvent);
    }
}
