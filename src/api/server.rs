//! HTTP surface of the flows: one POST endpoint plus a health check.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::engine::flows::{self, FlowError};
use crate::engine::llm_client::CompletionGateway;
use crate::model::flow::{ErrorBody, FlowRequest};

pub const EVALUATE_PATH: &str = "/api/evaluate-report";

/// Shared by every handler.
///
/// `gateway` is `None` when the credential was missing at startup; the server still
/// runs and answers every generation request with a configuration error.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Option<Arc<dyn CompletionGateway>>,
    pub unavailable_reason: Arc<str>,
}

impl AppState {
    pub fn ready(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self {
            gateway: Some(gateway),
            unavailable_reason: Arc::from(""),
        }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            gateway: None,
            unavailable_reason: Arc::from(reason.into()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthRes {
    ok: bool,
    gateway_configured: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            EVALUATE_PATH,
            post(evaluate_report).fallback(method_not_allowed),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = router(state);

    tracing::info!("-- Starting care report endpoint on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        gateway_configured: state.gateway.is_some(),
    })
}

async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        Json(ErrorBody {
            error: "Method Not Allowed".into(),
            detail: Some(format!("{} only accepts POST", EVALUATE_PATH)),
        }),
    )
        .into_response()
}

fn error_response(status: StatusCode, error: impl Into<String>, detail: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            detail,
        }),
    )
        .into_response()
}

fn flow_error_response(err: FlowError) -> Response {
    let status = if err.is_validation() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    if status.is_server_error() {
        tracing::error!(error = %err, "flow failed");
    } else {
        tracing::debug!(error = %err, "rejected request");
    }

    error_response(status, err.user_message(), Some(err.to_string()))
}

async fn evaluate_report(
    State(state): State<AppState>,
    body: Result<Json<FlowRequest>, JsonRejection>,
) -> Response {
    let Some(gateway) = state.gateway.clone() else {
        return flow_error_response(FlowError::Configuration(
            state.unavailable_reason.to_string(),
        ));
    };

    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "リクエストの形式が正しくありません。",
                Some(rejection.body_text()),
            )
        }
    };

    let flow = req.kind();
    tracing::info!(?flow, "evaluate-report request");

    let outcome = tokio::task::spawn_blocking(move || flows::run_flow(gateway.as_ref(), &req)).await;

    match outcome {
        Ok(Ok(body)) => Json(body).into_response(),
        Ok(Err(err)) => flow_error_response(err),
        Err(join) => {
            tracing::error!(error = %join, ?flow, "flow task aborted");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "AI評価中にサーバ側エラーが発生しました。",
                None,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::llm_client::testing::ScriptedGateway;
    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn post_json(body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(EVALUATE_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(resp: Response) -> Value {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn app_with(gateway: Arc<ScriptedGateway>) -> Router {
        router(AppState::ready(gateway))
    }

    #[tokio::test]
    async fn other_methods_get_405_with_allow_header() {
        let app = app_with(Arc::new(ScriptedGateway::new()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri(EVALUATE_PATH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()[header::ALLOW], "POST");
        assert_eq!(read_json(resp).await["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn missing_credential_fails_every_request() {
        let app = router(AppState::unavailable("OPENAI_API_KEY is not set"));
        let resp = app
            .oneshot(post_json(json!({ "flow": "classifyEvent", "summary": "転倒" })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(resp).await;
        assert_eq!(body["error"], "AIサービスを利用できません（設定エラー）。");
        assert!(body["detail"].as_str().unwrap().contains("OPENAI_API_KEY"));
    }

    #[tokio::test]
    async fn build_report_without_qa_log_is_a_400() {
        let gateway = Arc::new(ScriptedGateway::new().reply("使われない"));
        let app = app_with(gateway.clone());
        let resp = app
            .oneshot(post_json(json!({
                "flow": "buildReport",
                "summary": "夜間に転倒",
                "qaLog": []
            })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["detail"], "qaLog is required for buildReport");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn classify_returns_the_safety_floor() {
        let gateway = Arc::new(
            ScriptedGateway::new().reply(r#"{"category":"social_routine","reason":"食事中の出来事"}"#),
        );
        let resp = app_with(gateway)
            .oneshot(post_json(json!({
                "flow": "classifyEvent",
                "summary": "利用者が食堂で転倒し右膝を打撲"
            })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["eventCategory"], "acute_event");
        assert_eq!(body["safetyOverride"], true);
    }

    #[tokio::test]
    async fn seed_text_alias_drives_question_generation() {
        let gateway = Arc::new(ScriptedGateway::new().reply(
            r#"{"questions":[{"id":"q1","question":"痛みの部位は？","type":"text"}]}"#,
        ));
        let resp = app_with(gateway.clone())
            .oneshot(post_json(json!({
                "flow": "generateQuestions",
                "seedText": "夕方から発熱"
            })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = read_json(resp).await;
        assert_eq!(body["questions"][0]["label"], "痛みの部位は？");
        assert!(gateway.calls()[0].user_content.contains("夕方から発熱"));
    }

    #[tokio::test]
    async fn unusable_reply_is_a_500() {
        let gateway = Arc::new(ScriptedGateway::new().reply("すみません、わかりません。"));
        let resp = app_with(gateway)
            .oneshot(post_json(json!({ "flow": "generateQuestions", "summary": "発熱" })))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            read_json(resp).await["error"],
            "AIの応答を解釈できませんでした。もう一度お試しください。"
        );
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let app = app_with(Arc::new(ScriptedGateway::new()));
        let resp = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(EVALUATE_PATH)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_gateway_state() {
        let resp = router(AppState::unavailable("no key"))
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(read_json(resp).await["gatewayConfigured"], false);
    }
}
