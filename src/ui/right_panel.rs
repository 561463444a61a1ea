use eframe::egui;
use std::fs;

use crate::model::evaluation::{EvaluationResult, LocalScore};
use crate::ui::app::{RightTab, UiState};

pub fn draw_right_panel(ctx: &egui::Context, ui_state: &mut UiState) {
    egui::SidePanel::right("results")
        .resizable(true)
        .default_width(380.0)
        .min_width(280.0)
        .show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut ui_state.right_tab, RightTab::Evaluation, "評価");
                ui.selectable_value(&mut ui_state.right_tab, RightTab::Report, "報告文");
            });

            ui.separator();

            egui::ScrollArea::vertical().id_salt("results_scroll").show(ui, |ui| {
                match ui_state.right_tab {
                    RightTab::Evaluation => draw_evaluation_tab(ui, ui_state),
                    RightTab::Report => draw_report_tab(ui, ui_state),
                }
            });
        });
}

/* =========================
   Evaluation
   ========================= */

fn draw_evaluation_tab(ui: &mut egui::Ui, state: &mut UiState) {
    match &state.local_score {
        Some(local) => draw_local_score(ui, local),
        None => {
            ui.weak("簡易チェック：まだ実行されていません");
        }
    }

    ui.separator();

    if state.waiting_direct {
        ui.horizontal(|ui| {
            ui.spinner();
            ui.label("AI評価中…");
        });
    }

    let Some(eval) = state.evaluation.clone() else {
        ui.weak("AI評価：まだ実行されていません");
        return;
    };

    draw_ai_result(ui, state, &eval);
}

fn draw_local_score(ui: &mut egui::Ui, local: &LocalScore) {
    ui.heading(format!("簡易チェック：{}点（{}）", local.score, local.level));
    for line in local.detail_lines() {
        ui.label(line);
    }
}

fn draw_ai_result(ui: &mut egui::Ui, state: &mut UiState, eval: &EvaluationResult) {
    let heading = match eval.ai_score {
        Some(score) => format!("AI評価：{}点", score),
        None => "AI評価：点数なし".to_string(),
    };
    ui.heading(heading);

    if !eval.feedback_text.is_empty() {
        ui.label(eval.feedback_text.as_str());
    }

    if !eval.rewrite_text.is_empty() {
        ui.separator();
        ui.strong("改善例");
        ui.label(eval.rewrite_text.as_str());
        ui.horizontal(|ui| {
            if ui.small_button("📋 コピー").clicked() {
                ui.ctx().copy_text(eval.rewrite_text.clone());
                state.status = Some("改善例をコピーしました。".into());
            }
            if ui.small_button("報告文に反映").clicked() {
                state.report_text = eval.rewrite_text.clone();
                state.right_tab = RightTab::Report;
            }
        });
    }

    if !eval.short_text.is_empty() {
        ui.separator();
        ui.strong("申し送り用（短文）");
        ui.label(eval.short_text.as_str());
        if ui.small_button("📋 コピー").clicked() {
            ui.ctx().copy_text(eval.short_text.clone());
            state.status = Some("短文をコピーしました。".into());
        }
    }

    if let Some(education) = &eval.education_text {
        ui.separator();
        ui.collapsing("教育用コメント", |ui| {
            ui.label(education.as_str());
        });
    }

    if let Some(doctor) = &eval.doctor_text {
        ui.separator();
        ui.strong("医師への報告文");
        ui.label(doctor.as_str());
        if ui.small_button("📋 コピー").clicked() {
            ui.ctx().copy_text(doctor.clone());
            state.status = Some("医師への報告文をコピーしました。".into());
        }
    }
}

/* =========================
   Report text
   ========================= */

fn draw_report_tab(ui: &mut egui::Ui, state: &mut UiState) {
    ui.add(
        egui::TextEdit::multiline(&mut state.report_text)
            .desired_rows(20)
            .desired_width(f32::INFINITY)
            .hint_text("左の「報告文を作成」を押すとここに表示されます"),
    );

    let has_text = !state.report_text.trim().is_empty();
    ui.horizontal(|ui| {
        if ui.add_enabled(has_text, egui::Button::new("📋 コピー")).clicked() {
            ui.ctx().copy_text(state.report_text.clone());
            state.status = Some("報告文をコピーしました。".into());
        }
        if ui.add_enabled(has_text, egui::Button::new("💾 保存…")).clicked() {
            save_report(state);
        }
    });
}

fn save_report(state: &mut UiState) {
    let name = format!("report_{}.txt", chrono::Local::now().format("%Y%m%d_%H%M"));
    let Some(path) = rfd::FileDialog::new()
        .set_file_name(&name)
        .add_filter("テキスト", &["txt"])
        .save_file()
    else {
        return;
    };

    state.status = Some(match fs::write(&path, &state.report_text) {
        Ok(()) => format!("保存しました: {}", path.display()),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "saving report failed");
            format!("保存できませんでした: {}", err)
        }
    });
}
