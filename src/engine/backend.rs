use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::flows::{self, FlowError};
use crate::engine::llm_client::CompletionGateway;
use crate::model::evaluation::EvaluationResult;
use crate::model::flow::{
    BuildReportResponse, ClassifyResponse, ErrorBody, FlowKind, FlowRequest, NextQuestionResponse,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    /// The request was incomplete; fix the input and resubmit.
    #[error("{message}")]
    Invalid { message: String, detail: Option<String> },
    /// Configuration or upstream failure; the same step may be retried later.
    #[error("{message}")]
    Unavailable { message: String, detail: Option<String> },
    /// The model answered but nothing usable could be read from it.
    #[error("{message}")]
    Unreadable { message: String, detail: Option<String> },
    #[error("could not reach the report service: {0}")]
    Transport(String),
}

impl BackendError {
    pub fn detail(&self) -> Option<&str> {
        match self {
            BackendError::Invalid { detail, .. }
            | BackendError::Unavailable { detail, .. }
            | BackendError::Unreadable { detail, .. } => detail.as_deref(),
            BackendError::Transport(_) => None,
        }
    }
}

impl From<FlowError> for BackendError {
    fn from(err: FlowError) -> Self {
        let message = err.user_message().to_string();
        let detail = Some(err.to_string());
        match err {
            FlowError::Validation(_) => BackendError::Invalid { message, detail },
            FlowError::Parse(_) => BackendError::Unreadable { message, detail },
            FlowError::Configuration(_) | FlowError::Gateway(_) => {
                BackendError::Unavailable { message, detail }
            }
        }
    }
}

/// Where the hearing steps are executed. Each call is one blocking round trip.
pub trait HearingBackend: Send {
    fn classify(&self, req: &FlowRequest) -> Result<ClassifyResponse, BackendError>;
    fn next_question(&self, req: &FlowRequest) -> Result<NextQuestionResponse, BackendError>;
    fn build_report(&self, req: &FlowRequest) -> Result<BuildReportResponse, BackendError>;
    fn full_evaluate(&self, req: &FlowRequest) -> Result<EvaluationResult, BackendError>;
    fn evaluate(&self, req: &FlowRequest) -> Result<EvaluationResult, BackendError>;
}

/// Runs the flows in-process against a gateway.
pub struct LocalBackend {
    gateway: Arc<dyn CompletionGateway>,
}

impl LocalBackend {
    pub fn new(gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { gateway }
    }
}

impl HearingBackend for LocalBackend {
    fn classify(&self, req: &FlowRequest) -> Result<ClassifyResponse, BackendError> {
        Ok(flows::classify_event(self.gateway.as_ref(), req)?)
    }

    fn next_question(&self, req: &FlowRequest) -> Result<NextQuestionResponse, BackendError> {
        Ok(flows::next_question(self.gateway.as_ref(), req)?)
    }

    fn build_report(&self, req: &FlowRequest) -> Result<BuildReportResponse, BackendError> {
        Ok(flows::build_report(self.gateway.as_ref(), req)?)
    }

    fn full_evaluate(&self, req: &FlowRequest) -> Result<EvaluationResult, BackendError> {
        Ok(flows::full_evaluate(self.gateway.as_ref(), req)?)
    }

    fn evaluate(&self, req: &FlowRequest) -> Result<EvaluationResult, BackendError> {
        Ok(flows::evaluate(self.gateway.as_ref(), req)?)
    }
}

/// Talks to a running `care-report serve` endpoint.
pub struct RemoteBackend {
    client: Client,
    endpoint: String,
}

impl RemoteBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn post<T: DeserializeOwned>(&self, flow: FlowKind, req: &FlowRequest) -> Result<T, BackendError> {
        let mut body = req.clone();
        body.flow = Some(flow);

        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            return resp.json::<T>().map_err(|e| BackendError::Unreadable {
                message: "サーバの応答を解釈できませんでした。".into(),
                detail: Some(e.to_string()),
            });
        }

        let body: ErrorBody = resp.json().unwrap_or_else(|_| ErrorBody {
            error: format!("HTTP {}", status.as_u16()),
            detail: None,
        });

        Err(error_from_status(status.as_u16(), body))
    }
}

fn error_from_status(status: u16, body: ErrorBody) -> BackendError {
    let ErrorBody { error, detail } = body;
    match status {
        400..=499 => BackendError::Invalid {
            message: error,
            detail,
        },
        _ => BackendError::Unavailable {
            message: error,
            detail,
        },
    }
}

impl HearingBackend for RemoteBackend {
    fn classify(&self, req: &FlowRequest) -> Result<ClassifyResponse, BackendError> {
        self.post(FlowKind::ClassifyEvent, req)
    }

    fn next_question(&self, req: &FlowRequest) -> Result<NextQuestionResponse, BackendError> {
        self.post(FlowKind::NextQuestion, req)
    }

    fn build_report(&self, req: &FlowRequest) -> Result<BuildReportResponse, BackendError> {
        self.post(FlowKind::BuildReport, req)
    }

    fn full_evaluate(&self, req: &FlowRequest) -> Result<EvaluationResult, BackendError> {
        self.post(FlowKind::FullEvaluate, req)
    }

    fn evaluate(&self, req: &FlowRequest) -> Result<EvaluationResult, BackendError> {
        self.post(FlowKind::Evaluate, req)
    }
}

/// Stands in when no usable backend could be built; every step fails fast.
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }

    fn refuse<T>(&self) -> Result<T, BackendError> {
        Err(BackendError::Unavailable {
            message: "AIサービスを利用できません（設定エラー）。".into(),
            detail: Some(self.reason.clone()),
        })
    }
}

impl HearingBackend for UnavailableBackend {
    fn classify(&self, _: &FlowRequest) -> Result<ClassifyResponse, BackendError> {
        self.refuse()
    }

    fn next_question(&self, _: &FlowRequest) -> Result<NextQuestionResponse, BackendError> {
        self.refuse()
    }

    fn build_report(&self, _: &FlowRequest) -> Result<BuildReportResponse, BackendError> {
        self.refuse()
    }

    fn full_evaluate(&self, _: &FlowRequest) -> Result<EvaluationResult, BackendError> {
        self.refuse()
    }

    fn evaluate(&self, _: &FlowRequest) -> Result<EvaluationResult, BackendError> {
        self.refuse()
    }
}
