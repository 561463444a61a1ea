use serde::{Deserialize, Serialize};

use crate::engine::orchestrator::ReportAssembly;
use crate::engine::protocol::{BackendChoice, EngineSettings};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/evaluate-report";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Local,
    Remote,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct UiSettings {
    pub ui_scale: f32,

    pub backend: BackendKind,
    pub endpoint_url: String,

    pub assembly: ReportAssembly,
    pub include_education: bool,

    /// A font with Japanese glyphs; egui's bundled fonts have none.
    pub font_path: Option<String>,
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            ui_scale: 1.0,
            backend: BackendKind::Local,
            endpoint_url: DEFAULT_ENDPOINT.into(),
            assembly: ReportAssembly::Generated,
            include_education: false,
            font_path: None,
        }
    }
}

impl UiSettings {
    pub fn engine_settings(&self) -> EngineSettings {
        let backend = match self.backend {
            BackendKind::Local => BackendChoice::Local,
            BackendKind::Remote => BackendChoice::Remote {
                endpoint: self.endpoint_url.trim().to_string(),
            },
        };

        EngineSettings {
            backend,
            assembly: self.assembly,
            include_education: self.include_education,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fill_in_defaults() {
        let s: UiSettings = serde_json::from_str(r#"{"ui_scale":1.5,"backend":"remote"}"#).unwrap();
        assert_eq!(s.ui_scale, 1.5);
        assert_eq!(s.backend, BackendKind::Remote);
        assert_eq!(s.endpoint_url, DEFAULT_ENDPOINT);
        assert_eq!(s.assembly, ReportAssembly::Generated);
    }

    #[test]
    fn remote_choice_carries_trimmed_endpoint() {
        let s = UiSettings {
            backend: BackendKind::Remote,
            endpoint_url: " http://care.local/api/evaluate-report ".into(),
            include_education: true,
            ..Default::default()
        };

        let engine = s.engine_settings();
        assert_eq!(
            engine.backend,
            BackendChoice::Remote {
                endpoint: "http://care.local/api/evaluate-report".into()
            }
        );
        assert!(engine.include_education);
    }
}
