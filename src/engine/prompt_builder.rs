use crate::engine::llm_client::OutputShape;
use crate::model::category::{CategoryDecision, EventCategory};
use crate::model::hearing::QaLog;
use crate::model::report::{BasicInfo, ReportMode, NOT_PROVIDED};

pub const SHORT_START: &str = "<<SHORT>>";
pub const SHORT_END: &str = "<<END_SHORT>>";
pub const DOCTOR_START: &str = "<<DOCTOR>>";
pub const DOCTOR_END: &str = "<<END_DOCTOR>>";

/// Upper bound on hearing length the model is told to respect.
pub const MAX_HEARING_QUESTIONS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Classify,
    NextQuestion,
    GenerateQuestions,
    BuildReport,
    FullEvaluate,
    /// Single-shot critique of an already written report.
    Evaluate,
}

impl PromptKind {
    pub fn name(self) -> &'static str {
        match self {
            PromptKind::Classify => "classifyEvent",
            PromptKind::NextQuestion => "nextQuestion",
            PromptKind::GenerateQuestions => "generateQuestions",
            PromptKind::BuildReport => "buildReport",
            PromptKind::FullEvaluate => "fullEvaluate",
            PromptKind::Evaluate => "evaluate",
        }
    }

    pub fn temperature(self) -> f32 {
        match self {
            PromptKind::Classify => 0.0,
            PromptKind::NextQuestion => 0.2,
            PromptKind::GenerateQuestions | PromptKind::BuildReport => 0.3,
            PromptKind::FullEvaluate | PromptKind::Evaluate => 0.4,
        }
    }

    pub fn output_shape(self) -> OutputShape {
        match self {
            PromptKind::Classify | PromptKind::NextQuestion | PromptKind::GenerateQuestions => {
                OutputShape::Json
            }
            PromptKind::BuildReport | PromptKind::FullEvaluate | PromptKind::Evaluate => {
                OutputShape::Text
            }
        }
    }
}

/// Everything a prompt may mention. Absent fields render as an explicit placeholder.
#[derive(Debug, Clone, Default)]
pub struct PromptPayload {
    pub mode: ReportMode,
    pub summary: String,
    pub basic_info: BasicInfo,
    pub vital_text: String,
    pub qa_log: QaLog,
    pub manual_category: Option<EventCategory>,
    pub event_category: Option<CategoryDecision>,
    pub report_text: String,
    pub local_score: Option<u8>,
    pub missing_required: Vec<String>,
    pub missing_optional: Vec<String>,
    pub include_education: bool,
    /// Labels the model proposed that only repeat known information.
    pub declined_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub role_instructions: String,
    pub user_content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("{field} is required for {flow}")]
    MissingRequiredField {
        field: &'static str,
        flow: &'static str,
    },
}

fn require(ok: bool, field: &'static str, kind: PromptKind) -> Result<(), PromptError> {
    if ok {
        Ok(())
    } else {
        Err(PromptError::MissingRequiredField {
            field,
            flow: kind.name(),
        })
    }
}

fn validate(kind: PromptKind, payload: &PromptPayload) -> Result<(), PromptError> {
    let has_summary = !payload.summary.trim().is_empty();
    let has_report = !payload.report_text.trim().is_empty();

    match kind {
        PromptKind::Classify | PromptKind::NextQuestion | PromptKind::GenerateQuestions => {
            require(has_summary, "summary", kind)
        }
        PromptKind::BuildReport => {
            require(has_summary, "summary", kind)?;
            require(!payload.qa_log.is_empty(), "qaLog", kind)
        }
        PromptKind::FullEvaluate | PromptKind::Evaluate => require(has_report, "reportText", kind),
    }
}

/// Renders the role block and user content for one flow.
///
/// Pure formatting: identical payloads give byte-identical prompts.
pub fn build_prompt(kind: PromptKind, payload: &PromptPayload) -> Result<Prompt, PromptError> {
    validate(kind, payload)?;

    let mut role = String::new();
    push_role(&mut role, kind);

    let mut user = String::new();
    push_mode(&mut user, payload);
    push_basic_info(&mut user, &payload.basic_info);
    push_field(&mut user, "バイタル", &payload.vital_text);
    push_field(&mut user, "概要", &payload.summary);
    push_categories(&mut user, payload);
    push_qa_log(&mut user, &payload.qa_log);
    push_report_text(&mut user, &payload.report_text);
    push_local_score(&mut user, payload);

    match kind {
        PromptKind::Classify => push_classify_format(&mut user),
        PromptKind::NextQuestion => push_next_question_format(&mut user, payload),
        PromptKind::GenerateQuestions => push_generate_questions_format(&mut user),
        PromptKind::BuildReport => push_build_report_format(&mut user, payload.mode),
        PromptKind::FullEvaluate => push_full_evaluate_format(&mut user, payload.include_education),
        PromptKind::Evaluate => push_evaluate_format(&mut user),
    }

    Ok(Prompt {
        role_instructions: role,
        user_content: user,
    })
}

fn or_placeholder(value: &str) -> &str {
    let value = value.trim();
    if value.is_empty() {
        NOT_PROVIDED
    } else {
        value
    }
}

fn push_role(prompt: &mut String, kind: PromptKind) {
    prompt.push_str(
        "あなたは介護施設の「看護師長 兼 管理者」として、現場職員の報告力・指示力を育てるコーチです。\n\n\
【共通ルール】\n\
- 不足情報は勝手に補わず、「情報不足」と明記する。\n\
- 「（未入力）」と書かれた項目は不明として扱い、推測で埋めない。\n\
- 職員を責める言い方は禁止。改善の方向性を伝える。\n\
- 転倒・転落・SpO2低下・胸痛・出血・嘔吐・急なバイタル変化などの兆候は、安全側に倒して扱う。\n",
    );

    let specific = match kind {
        PromptKind::Classify => {
            "\n【あなたの役割】\n\
職員が入力した出来事の概要を読み、事象の種類を1つに分類します。\n\
職員が分類を選んでいても、高リスクの兆候があれば必ず acute_event を選んでください。\n"
        }
        PromptKind::NextQuestion => {
            "\n【あなたの役割】\n\
報告に必要な情報を集めるため、職員に質問を1つずつ行うヒアリング担当です。\n\
- 基本情報・バイタル・概要にすでに書かれている内容は絶対に質問しない。\n\
- これまでのヒアリングで聞いた質問は、言い回しを変えても再度聞かない。\n\
- 選択肢で答えられる質問を優先し、職員の負担を減らす。\n"
        }
        PromptKind::GenerateQuestions => {
            "\n【あなたの役割】\n\
報告に不足している情報を確認するための質問リストを作成します。\n\
- 基本情報・バイタル・概要にすでに書かれている内容は質問しない。\n\
- 選択肢で答えられる質問を優先する。\n"
        }
        PromptKind::BuildReport => {
            "\n【あなたの役割】\n\
基本情報・概要・ヒアリング内容だけを使い、管理者や看護師が読んで誤解のない報告文を作成します。\n\
- 書かれていない事実を追加しない。\n\
- 時系列を整理し、重複を削除する。\n"
        }
        PromptKind::FullEvaluate | PromptKind::Evaluate => {
            "\n【あなたの役割】\n\
職員の報告（または指示文）を評価し、改善案を示します。\n\
- 曖昧な表現があれば必ず指摘し、専門職向けの客観的な表現に変換する。\n\
- 文章構成の整理・重複削除・時系列整理も積極的に行う。\n\
- 文章は、誰が読んでも分かるように簡潔に。\n"
        }
    };

    prompt.push_str(specific);
}

fn push_mode(prompt: &mut String, payload: &PromptPayload) {
    prompt.push_str(&format!("【モード】{}\n\n", payload.mode.name()));
}

fn push_basic_info(prompt: &mut String, info: &BasicInfo) {
    prompt.push_str("【基本情報】\n");
    prompt.push_str(&format!("- 作成者: {}\n", or_placeholder(&info.author)));
    prompt.push_str(&format!("- 対象者: {}\n", or_placeholder(&info.subject)));
    prompt.push_str(&format!("- 日時: {}\n", or_placeholder(&info.timestamp)));
    prompt.push_str(&format!("- 場所: {}\n\n", or_placeholder(&info.location)));
}

fn push_field(prompt: &mut String, label: &str, value: &str) {
    prompt.push_str(&format!("【{}】\n{}\n\n", label, or_placeholder(value)));
}

fn push_categories(prompt: &mut String, payload: &PromptPayload) {
    let manual = payload
        .manual_category
        .map(|c| format!("{}（{}）", c.label(), c.wire_name()))
        .unwrap_or_else(|| NOT_PROVIDED.to_string());
    prompt.push_str(&format!("【職員が選択した分類】\n{}\n\n", manual));

    let decided = match &payload.event_category {
        Some(d) if d.rationale.trim().is_empty() => {
            format!("{}（{}）", d.label, d.category.wire_name())
        }
        Some(d) => format!("{}（{}）: {}", d.label, d.category.wire_name(), d.rationale.trim()),
        None => NOT_PROVIDED.to_string(),
    };
    prompt.push_str(&format!("【事象分類】\n{}\n\n", decided));
}

fn push_qa_log(prompt: &mut String, log: &QaLog) {
    prompt.push_str("【これまでのヒアリング】\n");

    if log.is_empty() {
        prompt.push_str("（まだありません）\n\n");
        return;
    }

    for (i, exchange) in log.entries().iter().enumerate() {
        prompt.push_str(&format!(
            "{}. [{}] Q: {}\n   A: {}\n",
            i + 1,
            exchange.question_id,
            exchange.question_label,
            exchange.answer.display()
        ));
    }
    prompt.push('\n');
}

fn push_report_text(prompt: &mut String, report_text: &str) {
    prompt.push_str("【職員が作成した文章】\n---\n");
    prompt.push_str(or_placeholder(report_text));
    prompt.push_str("\n---\n\n");
}

fn push_local_score(prompt: &mut String, payload: &PromptPayload) {
    // Without a local check, empty lists mean "unknown" rather than "nothing missing".
    let empty = if payload.local_score.is_some() { "なし" } else { NOT_PROVIDED };
    let join = |items: &[String]| {
        if items.is_empty() {
            empty.to_string()
        } else {
            items.join("／")
        }
    };

    match payload.local_score {
        Some(score) => prompt.push_str(&format!("【ローカルスコア】\n{} 点\n\n", score)),
        None => prompt.push_str(&format!("【ローカルスコア】\n{}\n\n", NOT_PROVIDED)),
    }
    prompt.push_str("【不足している可能性のある項目】\n");
    prompt.push_str(&format!("- 必須: {}\n", join(&payload.missing_required)));
    prompt.push_str(&format!("- 任意: {}\n\n", join(&payload.missing_optional)));
}

fn push_classify_format(prompt: &mut String) {
    prompt.push_str("【分類の候補】\n");
    for category in EventCategory::ALL {
        prompt.push_str(&format!(
            "- {}: {}（{}）\n",
            category.wire_name(),
            category.label(),
            category.description()
        ));
    }

    prompt.push_str(
        "\n【出力フォーマット】\n\
次の JSON だけを返してください。説明文やコードブロックは不要です。\n\
{\"category\": \"<上の候補の英字名>\", \"label\": \"<日本語ラベル>\", \"reason\": \"<1〜2文の理由>\"}\n",
    );
}

fn push_question_schema(prompt: &mut String) {
    prompt.push_str(
        "質問オブジェクトの形式:\n\
{\"id\": \"q1\", \"label\": \"<質問文>\", \"type\": \"single|multi|text\", \"options\": [\"<選択肢>\"], \"note\": \"<補足（任意）>\", \"allowFreeText\": true}\n\
- type が text のとき options は空配列。\n\
- 選択肢だけでは答えにくい場合は allowFreeText を true にする。\n",
    );
}

fn push_next_question_format(prompt: &mut String, payload: &PromptPayload) {
    let asked = payload.qa_log.len();

    prompt.push_str(&format!(
        "【進行状況】\nこれまでに {} 問質問しました（上限の目安は {} 問）。\n\n",
        asked, MAX_HEARING_QUESTIONS
    ));

    prompt.push_str("【既に分かっているため聞かない質問】\n");
    if payload.declined_questions.is_empty() {
        prompt.push_str("（なし）\n\n");
    } else {
        for label in &payload.declined_questions {
            prompt.push_str(&format!("- {}\n", label));
        }
        prompt.push_str("これらとは別の観点で質問してください。\n\n");
    }

    prompt.push_str(
        "【出力フォーマット】\n\
次の質問を1つだけ、JSON で返してください。説明文やコードブロックは不要です。\n\
{\"done\": false, \"question\": <質問オブジェクト>}\n\
報告に必要な情報がそろった場合、または上限に達した場合は {\"done\": true} だけを返してください。\n",
    );
    push_question_schema(prompt);
}

fn push_generate_questions_format(prompt: &mut String) {
    prompt.push_str(
        "【出力フォーマット】\n\
確認したい質問を3〜6問、JSON で返してください。説明文やコードブロックは不要です。\n\
{\"questions\": [<質問オブジェクト>, ...]}\n",
    );
    push_question_schema(prompt);
}

fn push_build_report_format(prompt: &mut String, mode: ReportMode) {
    prompt.push_str(&format!(
        "【出力フォーマット】\n\
次の見出しで報告文を作成し、報告文だけを出力してください。\n\
■ {}\n\
■ 基本情報（対象・日時・場所）\n\
■ {}\n\
■ バイタル／数値情報\n\
■ {}\n\
■ {}\n\
■ 職員として感じた違和感\n\
情報がない見出しには「情報不足」と書いてください。\n",
        mode.summary_label(),
        mode.details_label(),
        mode.actions_label(),
        mode.goal_label()
    ));
}

fn push_check_points(prompt: &mut String) {
    prompt.push_str(
        "【チェックの観点】\n\
- 安全面（急変・再発・危険の見落としがないか）\n\
- 情報抜け漏れ（誰が／いつ／どこで／何をした／どうなった）\n\
- 指示モードでは「いつまでに・どこまでやれば完了か」が明確か\n\
- 専門職が読んで分かる具体性\n\n",
    );
}

fn push_score_and_short(prompt: &mut String) {
    prompt.push_str(&format!(
        "\n最後に「スコア：85」のように 0〜100 の総合点を1つだけ示してください。\n\n\
さらに **回答の一番最後** に、夜勤・申し送り用の3行要約のみを次の形式で再掲してください：\n\n\
{}\n（ここに3行要約のみ）\n{}\n",
        SHORT_START, SHORT_END
    ));
}

fn push_full_evaluate_format(prompt: &mut String, include_education: bool) {
    push_check_points(prompt);

    prompt.push_str(
        "【出力フォーマット】\n\
① 総評（1〜3行）\n\
② 曖昧表現の指摘と改善案（箇条書きOK）\n\
③ 不足している情報（事実ベースで）\n\
④ 管理者として追加で確認したい点（質問リスト）\n\
⑤ 専門的な書き直し例（全文）\n\
⑥ 夜勤・申し送り用の3行要約（重要な事実のみ）\n",
    );

    if include_education {
        prompt.push_str("⑦ 教育・指導メモ（この職員に次回伝えたいポイントを2〜4点）\n");
    } else {
        prompt.push_str("⑦ は出力しないでください。\n");
    }

    prompt.push_str("⑧ 医師向けサマリー（経過・バイタル・実施した対応を医師が30秒で読める形で）\n");

    prompt.push_str(&format!(
        "\n⑧ の内容は次の形式でも再掲してください：\n{}\n（医師向けサマリーのみ）\n{}\n",
        DOCTOR_START, DOCTOR_END
    ));

    push_score_and_short(prompt);
}

fn push_evaluate_format(prompt: &mut String) {
    push_check_points(prompt);

    prompt.push_str(
        "【出力フォーマット】\n\
① 総評（1〜3行）\n\
② 曖昧表現の指摘と改善案（箇条書きOK）\n\
③ 不足している情報（事実ベースで）\n\
④ 管理者として追加で確認したい点（質問リスト）\n\
⑤ 専門的な書き直し例（全文）\n\
⑥ 夜勤・申し送り用の3行要約（重要な事実のみ）\n",
    );

    push_score_and_short(prompt);
}
