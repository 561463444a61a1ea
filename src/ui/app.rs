use eframe::egui;
use std::sync::mpsc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::engine::backend::UnavailableBackend;
use crate::engine::engine::Engine;
use crate::engine::local_score::{evaluate_local, evaluate_quick};
use crate::engine::orchestrator::{HearingState, ReportAssembly};
use crate::engine::protocol::{EngineCommand, EngineResponse};
use crate::engine::report_template::{build_quick_report, build_report_text};
use crate::model::category::{CategoryDecision, EventCategory};
use crate::model::evaluation::{EvaluationResult, LocalScore};
use crate::model::hearing::{HearingQuestion, QaLog};
use crate::model::report::{ReportDraft, VitalSigns};
use crate::ui::center_panel::draw_center_panel;
use crate::ui::fonts::install_japanese_font;
use crate::ui::left_panel::draw_left_panel;
use crate::ui::right_panel::draw_right_panel;
use crate::ui::settings::{BackendKind, UiSettings};
use crate::ui::settings_io::{load_settings, save_settings};

/* =========================
   Tabs
   ========================= */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Full,
    Quick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RightTab {
    #[default]
    Evaluation,
    Report,
}

/* =========================
   Form
   ========================= */

/// Raw text of the vital inputs; parsed only when the form is submitted.
#[derive(Debug, Clone, Default)]
pub struct VitalInputs {
    pub temperature: String,
    pub systolic: String,
    pub diastolic: String,
    pub pulse: String,
    pub spo2: String,
}

pub const QUICK_TAGS: &[&str] = &["事故・ヒヤリハット", "体調変化", "家族連絡", "申し送り", "業務連絡"];

/* =========================
   Hearing view
   ========================= */

#[derive(Default)]
pub struct HearingView {
    pub state: HearingState,
    pub category: Option<CategoryDecision>,
    pub transcript: QaLog,
    pub question: Option<HearingQuestion>,

    pub selected: Vec<String>,
    pub free_text: String,
}

pub struct ErrorNotice {
    pub message: String,
    pub detail: Option<String>,
    pub retryable: bool,
}

/* =========================
   UI State
   ========================= */

#[derive(Default)]
pub struct UiState {
    pub draft: ReportDraft,
    pub vitals: VitalInputs,
    pub manual_category: Option<EventCategory>,
    pub input_mode: InputMode,
    pub quick_memo: String,
    pub quick_tags: Vec<String>,
    pub form_error: Option<String>,

    pub hearing: HearingView,
    pub error: Option<ErrorNotice>,
    pub waiting_direct: bool,
    pub status: Option<String>,

    pub report_text: String,
    pub local_score: Option<LocalScore>,
    pub evaluation: Option<EvaluationResult>,
    pub right_tab: RightTab,

    pub settings: UiSettings,
    pub show_settings: bool,
    pub font_in_use: Option<String>,
}

impl UiState {
    pub fn busy(&self) -> bool {
        self.hearing.state.is_busy() || self.waiting_direct
    }

    /// The form as a draft. Bad vital input is reported on the form and yields `None`.
    pub fn snapshot(&mut self) -> Option<ReportDraft> {
        let v = &self.vitals;
        match VitalSigns::from_inputs(&v.temperature, &v.systolic, &v.diastolic, &v.pulse, &v.spo2) {
            Ok(vitals) => {
                self.form_error = None;
                let mut draft = self.draft.clone();
                draft.vitals = vitals;
                if self.input_mode == InputMode::Quick && draft.summary.trim().is_empty() {
                    draft.summary = self.quick_memo.trim().to_string();
                }
                Some(draft)
            }
            Err(err) => {
                self.form_error = Some(format!("バイタルの値を確認してください（{}）", err));
                None
            }
        }
    }

    /// Builds the local report text and offline score for the current input mode.
    pub fn compose_report(&mut self) -> Option<(ReportDraft, LocalScore)> {
        let draft = self.snapshot()?;

        let score = match self.input_mode {
            InputMode::Full => {
                self.report_text = build_report_text(&draft);
                evaluate_local(&draft)
            }
            InputMode::Quick => match build_quick_report(&draft, &self.quick_memo, &self.quick_tags) {
                Ok(text) => {
                    self.report_text = text;
                    evaluate_quick(&draft, &self.quick_memo)
                }
                Err(err) => {
                    self.form_error = Some(err.to_string());
                    return None;
                }
            },
        };

        self.local_score = Some(score.clone());
        Some((draft, score))
    }

    fn apply(&mut self, resp: EngineResponse) {
        match resp {
            EngineResponse::StateChanged(state) => {
                self.hearing.state = state;
                if state == HearingState::Idle {
                    self.hearing = HearingView::default();
                    self.error = None;
                }
                if state.is_busy() {
                    self.error = None;
                }
            }
            EngineResponse::Classified(decision) => {
                self.hearing.category = Some(decision);
            }
            EngineResponse::Question(question) => {
                self.hearing.selected.clear();
                self.hearing.free_text.clear();
                self.hearing.question = Some(question);
            }
            EngineResponse::Transcript(log) => {
                self.hearing.transcript = log;
            }
            EngineResponse::HearingComplete => {
                self.hearing.question = None;
                self.status = Some("ヒアリングが完了しました。内容を確認して「報告書を作成・評価」を押してください。".into());
            }
            EngineResponse::Evaluated {
                report_text,
                evaluation,
            } => {
                if let Some(text) = report_text {
                    self.report_text = text;
                }
                self.evaluation = Some(evaluation);
                self.waiting_direct = false;
                self.right_tab = RightTab::Evaluation;
                self.status = Some("AI評価が完了しました。".into());
            }
            EngineResponse::Failed {
                message,
                detail,
                retryable,
            } => {
                tracing::warn!(%message, "engine reported a failure");
                self.waiting_direct = false;
                self.error = Some(ErrorNotice {
                    message,
                    detail,
                    retryable,
                });
            }
        }
    }
}

/* =========================
   App
   ========================= */

pub struct MyApp {
    pub ui: UiState,

    cmd_tx: mpsc::Sender<EngineCommand>,
    resp_rx: mpsc::Receiver<EngineResponse>,
}

impl MyApp {
    pub fn new(cc: &eframe::CreationContext<'_>, gateway: GatewayConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();

        std::thread::spawn(move || {
            let backend = Box::new(UnavailableBackend::new("engine not configured yet"));
            let mut engine = Engine::new(cmd_rx, resp_tx, gateway, backend);
            engine.run();
        });

        let settings = load_settings();
        let _ = cmd_tx.send(EngineCommand::Configure(settings.engine_settings()));
        let font_in_use = install_japanese_font(&cc.egui_ctx, settings.font_path.as_deref());

        Self {
            ui: UiState {
                settings,
                font_in_use,
                ..Default::default()
            },
            cmd_tx,
            resp_rx,
        }
    }
}

/* =========================
   egui App
   ========================= */

impl eframe::App for MyApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        ctx.set_pixels_per_point(self.ui.settings.ui_scale);

        while let Ok(resp) = self.resp_rx.try_recv() {
            self.ui.apply(resp);
        }

        if self.ui.busy() {
            ctx.request_repaint_after(Duration::from_millis(150));
        }

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("介護記録ヒアリング");
                ui.separator();
                if ui.button("⚙ 設定").clicked() {
                    self.ui.show_settings = true;
                }
                if let Some(status) = &self.ui.status {
                    ui.separator();
                    ui.label(status.as_str());
                }
            });
        });

        draw_left_panel(ctx, &mut self.ui, &self.cmd_tx);
        draw_right_panel(ctx, &mut self.ui);
        draw_center_panel(ctx, &mut self.ui, &self.cmd_tx);

        if self.ui.show_settings {
            draw_settings_window(ctx, &mut self.ui, &self.cmd_tx);
        }
    }
}

/* =========================
   Settings window
   ========================= */

fn draw_settings_window(ctx: &egui::Context, state: &mut UiState, cmd_tx: &mpsc::Sender<EngineCommand>) {
    let mut open = state.show_settings;
    let mut apply = false;

    egui::Window::new("設定")
        .open(&mut open)
        .resizable(false)
        .show(ctx, |ui| {
            let s = &mut state.settings;

            ui.label("表示倍率");
            ui.add(egui::Slider::new(&mut s.ui_scale, 0.75..=2.0));

            ui.separator();
            ui.label("AIの呼び出し先");
            ui.radio_value(&mut s.backend, BackendKind::Local, "このアプリから直接（OPENAI_API_KEY）");
            ui.radio_value(&mut s.backend, BackendKind::Remote, "評価サーバ経由");
            ui.add_enabled(
                s.backend == BackendKind::Remote,
                egui::TextEdit::singleline(&mut s.endpoint_url).desired_width(320.0),
            );

            ui.separator();
            ui.label("ヒアリング後の報告書");
            ui.radio_value(
                &mut s.assembly,
                ReportAssembly::Generated,
                "AIが文章化する",
            );
            ui.radio_value(
                &mut s.assembly,
                ReportAssembly::LocalTemplate,
                "定型テンプレートで組み立てる",
            );
            ui.checkbox(&mut s.include_education, "教育・指導メモも出力する");

            ui.separator();
            ui.label("日本語フォント");
            ui.horizontal(|ui| {
                let mut path = s.font_path.clone().unwrap_or_default();
                if ui.text_edit_singleline(&mut path).changed() {
                    s.font_path = Some(path).filter(|p| !p.trim().is_empty());
                }
                if ui.button("参照…").clicked() {
                    if let Some(picked) = rfd::FileDialog::new()
                        .add_filter("Font", &["ttf", "otf", "ttc"])
                        .pick_file()
                    {
                        s.font_path = Some(picked.display().to_string());
                    }
                }
            });
            if let Some(font) = &state.font_in_use {
                ui.small(format!("使用中: {}", font));
            }

            ui.separator();
            if ui.button("保存して適用").clicked() {
                apply = true;
            }
        });

    if apply {
        if let Err(err) = save_settings(&state.settings) {
            tracing::error!(error = %err, "could not save settings");
            state.status = Some(format!("設定を保存できませんでした: {}", err));
        } else {
            state.status = Some("設定を保存しました。".into());
        }
        let _ = cmd_tx.send(EngineCommand::Configure(state.settings.engine_settings()));
        state.font_in_use = install_japanese_font(ctx, state.settings.font_path.as_deref());
    }

    state.show_settings = open;
}
