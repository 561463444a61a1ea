use eframe::egui;
use std::sync::Arc;

/// Tried in order when no font is configured.
const SYSTEM_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/fonts-japanese-gothic.ttf",
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "C:\\Windows\\Fonts\\meiryo.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
];

/// Installs the first readable font as a fallback for every family.
///
/// Returns the path that was used, or `None` when nothing could be read.
pub fn install_japanese_font(ctx: &egui::Context, configured: Option<&str>) -> Option<String> {
    let candidates = configured
        .filter(|p| !p.trim().is_empty())
        .into_iter()
        .chain(SYSTEM_CANDIDATES.iter().copied());

    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };

        let mut fonts = egui::FontDefinitions::default();
        fonts
            .font_data
            .insert("japanese".into(), Arc::new(egui::FontData::from_owned(bytes)));
        for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
            fonts
                .families
                .entry(family)
                .or_default()
                .push("japanese".into());
        }
        ctx.set_fonts(fonts);

        tracing::info!(path, "loaded Japanese font");
        return Some(path.to_string());
    }

    tracing::warn!("no Japanese font found; choose one in the settings window");
    None
}
