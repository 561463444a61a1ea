use eframe::egui;
use std::sync::mpsc::Sender;

use crate::engine::local_score::{evaluate_local, evaluate_quick};
use crate::engine::orchestrator::HearingState;
use crate::engine::protocol::EngineCommand;
use crate::model::category::EventCategory;
use crate::model::evaluation::LocalScore;
use crate::model::report::{ReportDraft, ReportMode};
use crate::ui::app::{InputMode, RightTab, UiState, QUICK_TAGS};

fn mode_description(mode: ReportMode) -> &'static str {
    match mode {
        ReportMode::Report => {
            "利用者の事故・状態変化・家族連絡などを、管理者や看護師に正確に伝える報告文を作成します。"
        }
        ReportMode::Instruction => "看護師・リーダーから現場職員への指示を、誤解なく伝わる文章にします。",
    }
}

pub fn draw_left_panel(ctx: &egui::Context, state: &mut UiState, cmd_tx: &Sender<EngineCommand>) {
    egui::SidePanel::left("form")
        .resizable(true)
        .default_width(340.0)
        .min_width(280.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical().id_salt("form_scroll").show(ui, |ui| {
                draw_mode(ui, state);
                ui.separator();
                draw_basic_info(ui, state);
                ui.separator();

                match state.input_mode {
                    InputMode::Full => draw_full_input(ui, state),
                    InputMode::Quick => draw_quick_input(ui, state),
                }

                ui.separator();
                draw_category(ui, state);
                ui.separator();
                draw_actions(ui, state, cmd_tx);
            });
        });
}

/* =========================
   Mode
   ========================= */

fn draw_mode(ui: &mut egui::Ui, state: &mut UiState) {
    ui.horizontal(|ui| {
        ui.label("モード");
        egui::ComboBox::from_id_salt("report_mode")
            .selected_text(state.draft.mode.name())
            .show_ui(ui, |ui| {
                for mode in [ReportMode::Report, ReportMode::Instruction] {
                    ui.selectable_value(&mut state.draft.mode, mode, mode.name());
                }
            });
    });
    ui.small(mode_description(state.draft.mode));

    ui.horizontal(|ui| {
        ui.selectable_value(&mut state.input_mode, InputMode::Full, "通常入力");
        ui.selectable_value(&mut state.input_mode, InputMode::Quick, "かんたん入力");
    });
}

/* =========================
   Basic info
   ========================= */

fn draw_basic_info(ui: &mut egui::Ui, state: &mut UiState) {
    let info = &mut state.draft.basic_info;

    egui::Grid::new("basic_info").num_columns(2).show(ui, |ui| {
        ui.label("作成者");
        ui.text_edit_singleline(&mut info.author);
        ui.end_row();

        ui.label("対象者");
        ui.text_edit_singleline(&mut info.subject);
        ui.end_row();

        ui.label("日時");
        ui.horizontal(|ui| {
            ui.add(egui::TextEdit::singleline(&mut info.timestamp).desired_width(150.0));
            if ui.small_button("現在").clicked() {
                info.timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
            }
        });
        ui.end_row();

        ui.label("場所");
        ui.text_edit_singleline(&mut info.location);
        ui.end_row();
    });
}

/* =========================
   Full / quick input
   ========================= */

fn multiline(ui: &mut egui::Ui, label: &str, text: &mut String) {
    ui.label(label);
    ui.add(
        egui::TextEdit::multiline(text)
            .desired_rows(3)
            .desired_width(f32::INFINITY),
    );
}

fn draw_full_input(ui: &mut egui::Ui, state: &mut UiState) {
    let mode = state.draft.mode;
    let d = &mut state.draft;

    multiline(ui, mode.summary_label(), &mut d.summary);
    multiline(ui, mode.details_label(), &mut d.details);
    multiline(ui, mode.actions_label(), &mut d.actions);
    multiline(ui, mode.goal_label(), &mut d.goal);

    ui.collapsing("バイタル", |ui| {
        let v = &mut state.vitals;
        egui::Grid::new("vitals").num_columns(2).show(ui, |ui| {
            for (label, value) in [
                ("体温 (℃)", &mut v.temperature),
                ("血圧 上", &mut v.systolic),
                ("血圧 下", &mut v.diastolic),
                ("脈拍", &mut v.pulse),
                ("SpO2 (%)", &mut v.spo2),
            ] {
                ui.label(label);
                ui.add(egui::TextEdit::singleline(value).desired_width(70.0));
                ui.end_row();
            }
        });
    });

    multiline(ui, "職員として感じた違和感", &mut state.draft.concern);
}

fn draw_quick_input(ui: &mut egui::Ui, state: &mut UiState) {
    ui.label("要点メモ（3〜5行）");
    ui.add(
        egui::TextEdit::multiline(&mut state.quick_memo)
            .desired_rows(5)
            .desired_width(f32::INFINITY)
            .hint_text("・夕食後に嘔吐1回\n・顔色不良なし"),
    );

    ui.label("カテゴリ・目的");
    ui.horizontal_wrapped(|ui| {
        for tag in QUICK_TAGS {
            let mut on = state.quick_tags.iter().any(|t| t.as_str() == *tag);
            if ui.toggle_value(&mut on, *tag).changed() {
                if on {
                    state.quick_tags.push(tag.to_string());
                } else {
                    state.quick_tags.retain(|t| t.as_str() != *tag);
                }
            }
        }
    });
}

/* =========================
   Category
   ========================= */

fn draw_category(ui: &mut egui::Ui, state: &mut UiState) {
    let selected = state
        .manual_category
        .map(EventCategory::label)
        .unwrap_or("自動（AIが判定）");

    ui.horizontal(|ui| {
        ui.label("事象分類");
        egui::ComboBox::from_id_salt("manual_category")
            .selected_text(selected)
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut state.manual_category, None, "自動（AIが判定）");
                for category in EventCategory::ALL {
                    if category == EventCategory::Unclassified {
                        continue;
                    }
                    ui.selectable_value(&mut state.manual_category, Some(category), category.label())
                        .on_hover_text(category.description());
                }
            });
    });
    ui.small("転倒・出血・嘔吐・急なバイタル変化などがあれば、選択に関わらず「事故・急変」として扱います。");
}

/* =========================
   Actions
   ========================= */

fn draw_actions(ui: &mut egui::Ui, state: &mut UiState, cmd_tx: &Sender<EngineCommand>) {
    let idle = !state.busy();

    ui.horizontal_wrapped(|ui| {
        if ui.add_enabled(idle, egui::Button::new("報告文を作成")).clicked()
            && state.compose_report().is_some()
        {
            state.right_tab = RightTab::Report;
        }

        if ui.add_enabled(idle, egui::Button::new("AI評価（単発）")).clicked() {
            if let Some((draft, local)) = state.compose_report() {
                state.waiting_direct = true;
                state.error = None;
                let _ = cmd_tx.send(EngineCommand::EvaluateDirect {
                    draft,
                    report_text: state.report_text.clone(),
                    local,
                });
            }
        }
    });

    let can_start = idle
        && matches!(
            state.hearing.state,
            HearingState::Idle | HearingState::Done | HearingState::Error
        );

    if ui
        .add_enabled(can_start, egui::Button::new("🗨 ヒアリング開始"))
        .clicked()
    {
        if let Some(draft) = state.snapshot() {
            if draft.summary.trim().is_empty() {
                state.form_error = Some("概要を入力してください。".into());
            } else {
                state.local_score = Some(evaluate_for(state, &draft));
                state.evaluation = None;
                state.error = None;
                let _ = cmd_tx.send(EngineCommand::StartHearing {
                    draft,
                    manual_category: state.manual_category,
                });
            }
        }
    }

    if let Some(err) = &state.form_error {
        ui.colored_label(egui::Color32::from_rgb(200, 60, 60), err);
    }
}

fn evaluate_for(state: &UiState, draft: &ReportDraft) -> LocalScore {
    match state.input_mode {
        InputMode::Full => evaluate_local(draft),
        InputMode::Quick => evaluate_quick(draft, &state.quick_memo),
    }
}
