use serde::{Deserialize, Serialize};

/// Placeholder rendered for any field the author left empty.
/// The model is told to read it as "unknown, do not guess".
pub const NOT_PROVIDED: &str = "（未入力）";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// 共有・報告: accidents, changes of condition, family contact.
    #[default]
    #[serde(alias = "normal")]
    Report,
    /// 指示: instructions from nurses / leaders to floor staff.
    Instruction,
}

impl ReportMode {
    pub fn name(self) -> &'static str {
        match self {
            ReportMode::Report => "共有・報告モード",
            ReportMode::Instruction => "指示モード",
        }
    }

    pub fn summary_label(self) -> &'static str {
        match self {
            ReportMode::Report => "概要",
            ReportMode::Instruction => "指示の概要",
        }
    }

    pub fn details_label(self) -> &'static str {
        match self {
            ReportMode::Report => "詳しい状況・経過",
            ReportMode::Instruction => "背景・理由",
        }
    }

    pub fn actions_label(self) -> &'static str {
        match self {
            ReportMode::Report => "実施した対応",
            ReportMode::Instruction => "具体的な指示内容",
        }
    }

    pub fn goal_label(self) -> &'static str {
        match self {
            ReportMode::Report => "今後の対応・ゴール",
            ReportMode::Instruction => "完了条件・報告ライン",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BasicInfo {
    #[serde(alias = "reporterName")]
    pub author: String,
    #[serde(alias = "userName")]
    pub subject: String,
    #[serde(alias = "eventDateTime")]
    pub timestamp: String,
    #[serde(alias = "eventPlace")]
    pub location: String,
}

impl BasicInfo {
    pub fn has_subject(&self) -> bool {
        !self.subject.trim().is_empty()
    }

    pub fn has_timestamp(&self) -> bool {
        !self.timestamp.trim().is_empty()
    }

    pub fn has_location(&self) -> bool {
        !self.location.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{field}: \"{value}\" is not a number between {min} and {max}")]
pub struct VitalRangeError {
    pub field: &'static str,
    pub value: String,
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VitalField {
    Temperature,
    Systolic,
    Diastolic,
    Pulse,
    Spo2,
}

impl VitalField {
    pub fn name(self) -> &'static str {
        match self {
            VitalField::Temperature => "temperature",
            VitalField::Systolic => "systolic",
            VitalField::Diastolic => "diastolic",
            VitalField::Pulse => "pulse",
            VitalField::Spo2 => "spo2",
        }
    }

    /// Plausible bounds; anything outside is treated as a typo.
    pub fn bounds(self) -> (f32, f32) {
        match self {
            VitalField::Temperature => (30.0, 45.0),
            VitalField::Systolic => (40.0, 300.0),
            VitalField::Diastolic => (20.0, 200.0),
            VitalField::Pulse => (20.0, 250.0),
            VitalField::Spo2 => (50.0, 100.0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VitalSigns {
    pub temperature: Option<f32>,
    pub systolic: Option<u16>,
    pub diastolic: Option<u16>,
    pub pulse: Option<u16>,
    pub spo2: Option<u16>,
}

impl VitalSigns {
    /// Parses one form field. Empty input means "not measured".
    pub fn parse_field(field: VitalField, raw: &str) -> Result<Option<f32>, VitalRangeError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let (min, max) = field.bounds();
        let out_of_range = || VitalRangeError {
            field: field.name(),
            value: raw.to_string(),
            min,
            max,
        };

        let value: f32 = raw.parse().map_err(|_| out_of_range())?;
        if !value.is_finite() || value < min || value > max {
            return Err(out_of_range());
        }
        Ok(Some(value))
    }

    /// Builds vitals from the raw text of the five form inputs.
    pub fn from_inputs(
        temperature: &str,
        systolic: &str,
        diastolic: &str,
        pulse: &str,
        spo2: &str,
    ) -> Result<Self, VitalRangeError> {
        let whole = |v: Option<f32>| v.map(|v| v.round() as u16);

        Ok(Self {
            temperature: Self::parse_field(VitalField::Temperature, temperature)?,
            systolic: whole(Self::parse_field(VitalField::Systolic, systolic)?),
            diastolic: whole(Self::parse_field(VitalField::Diastolic, diastolic)?),
            pulse: whole(Self::parse_field(VitalField::Pulse, pulse)?),
            spo2: whole(Self::parse_field(VitalField::Spo2, spo2)?),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_none()
            && self.systolic.is_none()
            && self.diastolic.is_none()
            && self.pulse.is_none()
            && self.spo2.is_none()
    }

    /// `BT 36.5℃、BP 120/80、P 72、SpO2 97%`. Blood pressure needs both values.
    pub fn vital_text(&self) -> String {
        let mut parts = Vec::new();

        if let Some(t) = self.temperature {
            parts.push(format!("BT {:.1}℃", t));
        }
        if let (Some(sys), Some(dia)) = (self.systolic, self.diastolic) {
            parts.push(format!("BP {}/{}", sys, dia));
        }
        if let Some(p) = self.pulse {
            parts.push(format!("P {}", p));
        }
        if let Some(s) = self.spo2 {
            parts.push(format!("SpO2 {}%", s));
        }

        parts.join("、")
    }

    /// True when any measured value sits in a range that warrants urgent attention.
    pub fn acute_swing(&self) -> bool {
        let spo2_low = self.spo2.is_some_and(|s| s < 90);
        let bp_abnormal = self.systolic.is_some_and(|s| s >= 180 || s < 90);
        let fever = self.temperature.is_some_and(|t| t >= 38.0);
        let pulse_abnormal = self.pulse.is_some_and(|p| p >= 120 || p < 50);

        spo2_low || bp_abnormal || fever || pulse_abnormal
    }
}

/// Everything the author typed into the form. Lives only in memory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportDraft {
    pub mode: ReportMode,
    pub basic_info: BasicInfo,
    pub vitals: VitalSigns,
    pub summary: String,
    pub details: String,
    pub actions: String,
    pub goal: String,
    pub concern: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_vital_input_is_not_measured() {
        assert_eq!(VitalSigns::parse_field(VitalField::Pulse, "  "), Ok(None));
    }

    #[test]
    fn out_of_range_vital_is_rejected() {
        let err = VitalSigns::parse_field(VitalField::Spo2, "130").unwrap_err();
        assert_eq!(err.field, "spo2");

        assert!(VitalSigns::parse_field(VitalField::Temperature, "abc").is_err());
    }

    #[test]
    fn vital_text_skips_half_blood_pressure() {
        let vitals = VitalSigns::from_inputs("36.5", "120", "", "72", "97").unwrap();
        assert_eq!(vitals.vital_text(), "BT 36.5℃、P 72、SpO2 97%");

        let vitals = VitalSigns::from_inputs("", "120", "80", "", "").unwrap();
        assert_eq!(vitals.vital_text(), "BP 120/80");
    }

    #[test]
    fn acute_swing_thresholds() {
        let calm = VitalSigns::from_inputs("36.6", "128", "76", "80", "96").unwrap();
        assert!(!calm.acute_swing());

        let desat = VitalSigns {
            spo2: Some(86),
            ..Default::default()
        };
        assert!(desat.acute_swing());

        let fever = VitalSigns {
            temperature: Some(38.4),
            ..Default::default()
        };
        assert!(fever.acute_swing());
    }

    #[test]
    fn basic_info_accepts_form_field_names() {
        let info: BasicInfo = serde_json::from_str(
            r#"{"reporterName":"佐藤","userName":"A様","eventDateTime":"10/19 14:00","eventPlace":"食堂"}"#,
        )
        .unwrap();
        assert_eq!(info.author, "佐藤");
        assert!(info.has_subject() && info.has_timestamp() && info.has_location());
    }
}
