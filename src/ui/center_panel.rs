use eframe::egui;
use egui::Layout;
use std::sync::mpsc::Sender;

use crate::engine::orchestrator::HearingState;
use crate::engine::protocol::EngineCommand;
use crate::model::category::EventCategory;
use crate::model::hearing::{Answer, AnswerModality, HearingQuestion};
use crate::ui::app::{HearingView, UiState};

const QUESTION_BG: egui::Color32 = egui::Color32::from_rgb(40, 90, 60);
const ANSWER_BG: egui::Color32 = egui::Color32::from_rgb(40, 70, 120);
const ERROR_FG: egui::Color32 = egui::Color32::from_rgb(200, 60, 60);

pub fn draw_center_panel(ctx: &egui::Context, state: &mut UiState, cmd_tx: &Sender<EngineCommand>) {
    // ---------- Answer / action bar ----------
    egui::TopBottomPanel::bottom("hearing_actions").show(ctx, |ui| {
        ui.add_space(4.0);
        draw_error(ui, state, cmd_tx);
        draw_controls(ui, state, cmd_tx);
        ui.add_space(4.0);
    });

    // ---------- Transcript ----------
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("ヒアリング");
            if state.hearing.state.is_busy() {
                ui.spinner();
            }
            ui.label(state.hearing.state.label());
        });

        if let Some(decision) = &state.hearing.category {
            ui.horizontal(|ui| {
                let color = if decision.category == EventCategory::AcuteEvent {
                    ERROR_FG
                } else {
                    ui.visuals().text_color()
                };
                ui.colored_label(color, format!("事象分類: {}", decision.label));
                if decision.safety_override {
                    ui.small("⚠ 安全側の判定（事故・急変）を適用");
                }
            });
            if !decision.rationale.is_empty() {
                ui.small(decision.rationale.as_str());
            }
        }

        ui.separator();

        egui::ScrollArea::vertical()
            .id_salt("transcript")
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for exchange in state.hearing.transcript.entries() {
                    draw_bubble(ui, QUESTION_BG, false, &exchange.question_label);
                    draw_bubble(ui, ANSWER_BG, true, &exchange.answer.display());
                }
                if let Some(question) = &state.hearing.question {
                    draw_bubble(ui, QUESTION_BG, false, &question.label);
                }
            });
    });
}

fn draw_bubble(ui: &mut egui::Ui, color: egui::Color32, right: bool, text: &str) {
    ui.add_space(6.0);

    let bubble = |ui: &mut egui::Ui| {
        egui::Frame::new()
            .fill(color)
            .corner_radius(egui::CornerRadius::same(8))
            .inner_margin(egui::Margin::symmetric(10, 6))
            .show(ui, |ui| {
                ui.label(egui::RichText::new(text).color(egui::Color32::WHITE));
            });
    };

    if right {
        ui.with_layout(Layout::right_to_left(egui::Align::TOP), bubble);
    } else {
        bubble(ui);
    }
}

/* =========================
   Errors
   ========================= */

fn draw_error(ui: &mut egui::Ui, state: &mut UiState, cmd_tx: &Sender<EngineCommand>) {
    let Some(err) = &state.error else {
        return;
    };

    ui.colored_label(ERROR_FG, err.message.as_str());
    if let Some(detail) = &err.detail {
        ui.collapsing("詳細", |ui| {
            ui.small(detail.as_str());
        });
    }

    let retry_allowed = err.retryable && state.hearing.state == HearingState::Error;
    ui.horizontal(|ui| {
        if retry_allowed && ui.button("↻ 再試行").clicked() {
            let _ = cmd_tx.send(EngineCommand::Retry);
        }
        if ui.button("閉じる").clicked() {
            state.error = None;
        }
    });
    ui.separator();
}

/* =========================
   Controls per state
   ========================= */

fn draw_controls(ui: &mut egui::Ui, state: &mut UiState, cmd_tx: &Sender<EngineCommand>) {
    match state.hearing.state {
        HearingState::Idle => {
            ui.label("左のフォームに概要を入力し「ヒアリング開始」を押してください。");
        }
        HearingState::AwaitingAnswer => {
            if let Some(question) = state.hearing.question.clone() {
                draw_answer_input(ui, &question, &mut state.hearing, cmd_tx);
            }
        }
        HearingState::ReadyToBuild => {
            ui.label(format!(
                "{}件の回答を記録しました。基本情報を見直してから報告書を作成できます。",
                state.hearing.transcript.len()
            ));
            ui.horizontal(|ui| {
                if ui.button("📝 報告書を作成・評価").clicked() {
                    if let Some(draft) = state.snapshot() {
                        let _ = cmd_tx.send(EngineCommand::UpdateDraft(draft));
                        let _ = cmd_tx.send(EngineCommand::BuildReport);
                    }
                }
                if ui.button("やり直す").clicked() {
                    let _ = cmd_tx.send(EngineCommand::Reset);
                }
            });
        }
        HearingState::Done => {
            ui.horizontal(|ui| {
                ui.label("評価が完了しました。右側の結果を確認してください。");
                if ui.button("新しいヒアリング").clicked() {
                    let _ = cmd_tx.send(EngineCommand::Reset);
                }
            });
        }
        HearingState::Error => {
            if ui.button("リセット").clicked() {
                let _ = cmd_tx.send(EngineCommand::Reset);
            }
        }
        HearingState::Classifying | HearingState::FetchingNextQuestion | HearingState::Evaluating => {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label(state.hearing.state.label());
            });
        }
    }
}

fn draw_answer_input(
    ui: &mut egui::Ui,
    question: &HearingQuestion,
    view: &mut HearingView,
    cmd_tx: &Sender<EngineCommand>,
) {
    ui.label(egui::RichText::new(question.label.as_str()).strong());
    if let Some(note) = &question.note {
        ui.small(note.as_str());
    }

    match question.modality {
        AnswerModality::Single => {
            ui.horizontal_wrapped(|ui| {
                for option in &question.options {
                    let chosen = view.selected.first() == Some(option);
                    if ui.radio(chosen, option.as_str()).clicked() {
                        view.selected = vec![option.clone()];
                    }
                }
            });
        }
        AnswerModality::Multi => {
            ui.horizontal_wrapped(|ui| {
                for option in &question.options {
                    let mut on = view.selected.contains(option);
                    if ui.checkbox(&mut on, option.as_str()).changed() {
                        if on {
                            view.selected.push(option.clone());
                        } else {
                            view.selected.retain(|s| s != option);
                        }
                    }
                }
            });
        }
        AnswerModality::Text => {}
    }

    let mut send_now = false;
    if question.allow_free_text || question.modality == AnswerModality::Text {
        let response = ui.add(
            egui::TextEdit::multiline(&mut view.free_text)
                .desired_rows(2)
                .desired_width(f32::INFINITY)
                .hint_text("補足があれば入力（Enterで送信 / Shift+Enterで改行）"),
        );

        if response.has_focus() {
            let enter = ui.input(|i| i.key_pressed(egui::Key::Enter) && !i.modifiers.shift);
            if enter {
                send_now = true;
            }
        }
    }

    let answer = Answer {
        selected: view.selected.clone(),
        free_text: view.free_text.trim().to_string(),
    };

    ui.horizontal(|ui| {
        if ui
            .add_enabled(!answer.is_empty(), egui::Button::new("回答する"))
            .clicked()
        {
            send_now = true;
        }
        if ui.button("ここで終了").clicked() {
            let _ = cmd_tx.send(EngineCommand::FinishHearing);
        }
    });

    if send_now && !answer.is_empty() {
        let _ = cmd_tx.send(EngineCommand::SubmitAnswer(answer));
        view.selected.clear();
        view.free_text.clear();
    }
}
