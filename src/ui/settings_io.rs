use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ui::settings::UiSettings;

fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("care_report");
    path.push("ui_settings.json");
    path
}

pub fn load_settings() -> UiSettings {
    load_from(&settings_path())
}

pub fn save_settings(settings: &UiSettings) -> anyhow::Result<()> {
    save_to(&settings_path(), settings)
}

/// Missing or unreadable files fall back to defaults.
fn load_from(path: &Path) -> UiSettings {
    let Ok(text) = fs::read_to_string(path) else {
        return UiSettings::default();
    };

    serde_json::from_str(&text).unwrap_or_else(|err| {
        tracing::warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
        UiSettings::default()
    })
}

fn save_to(path: &Path, settings: &UiSettings) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
