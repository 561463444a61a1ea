use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GatewayConfig;

/// What the caller expects back; JSON turns on the API's JSON response mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputShape {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub shape: OutputShape,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Missing or rejected credential. Not fixable by retrying.
    #[error("generation service is not configured: {0}")]
    Configuration(String),
    #[error("generation service returned {status}: {detail}")]
    Upstream { status: u16, detail: String },
    #[error("generation service unreachable: {0}")]
    Transport(String),
    #[error("generation service timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation service returned no content")]
    EmptyResponse,
}

/// One request/response round trip to a text-generation service.
pub trait CompletionGateway: Send + Sync {
    fn complete(
        &self,
        role_instructions: &str,
        user_content: &str,
        options: &CompletionOptions,
    ) -> Result<String, GatewayError>;
}

#[derive(Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub struct Choice {
    pub message: ChatMessageResponse,
}

#[derive(Deserialize)]
pub struct ChatMessageResponse {
    #[serde(default)]
    pub content: Option<String>,
}

/// OpenAI-compatible chat-completions gateway. No retries: a failure goes straight
/// back to the caller, who may repeat the step by hand.
pub struct OpenAiGateway {
    client: Client,
    api_base: String,
    api_key: String,
    model: String,
    timeout: Duration,
}

impl OpenAiGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GatewayError::Configuration("OPENAI_API_KEY is not set".into()))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout: config.timeout,
        })
    }

    fn request_body(
        &self,
        role_instructions: &str,
        user_content: &str,
        options: &CompletionOptions,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            temperature: options.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: role_instructions.to_string(),
                },
                ChatMessage {
                    role: "user".into(),
                    content: user_content.to_string(),
                },
            ],
            response_format: match options.shape {
                OutputShape::Json => Some(ResponseFormat {
                    kind: "json_object".into(),
                }),
                OutputShape::Text => None,
            },
        }
    }
}

impl CompletionGateway for OpenAiGateway {
    fn complete(
        &self,
        role_instructions: &str,
        user_content: &str,
        options: &CompletionOptions,
    ) -> Result<String, GatewayError> {
        let req = self.request_body(role_instructions, user_content, options);

        tracing::debug!(
            model = %self.model,
            temperature = options.temperature,
            user_chars = user_content.chars().count(),
            "sending completion request"
        );

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Timeout(self.timeout)
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(GatewayError::Configuration(format!(
                "credential rejected ({})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            tracing::error!(status = status.as_u16(), "completion request failed");
            return Err(GatewayError::Upstream {
                status: status.as_u16(),
                detail,
            });
        }

        let body: ChatCompletionResponse = resp.json().map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout(self.timeout)
            } else {
                GatewayError::Transport(e.to_string())
            }
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(GatewayError::EmptyResponse)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A prompt the scripted gateway received.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub role_instructions: String,
        pub user_content: String,
        pub options: CompletionOptions,
    }

    /// Replays canned replies in order and records every prompt.
    #[derive(Default)]
    pub struct ScriptedGateway {
        replies: Mutex<VecDeque<Result<String, GatewayError>>>,
        calls: Mutex<Vec<RecordedCall>>,
    }

    impl ScriptedGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn reply(self, text: impl Into<String>) -> Self {
            self.replies.lock().unwrap().push_back(Ok(text.into()));
            self
        }

        pub fn fail(self, err: GatewayError) -> Self {
            self.replies.lock().unwrap().push_back(Err(err));
            self
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl CompletionGateway for ScriptedGateway {
        fn complete(
            &self,
            role_instructions: &str,
            user_content: &str,
            options: &CompletionOptions,
        ) -> Result<String, GatewayError> {
            self.calls.lock().unwrap().push(RecordedCall {
                role_instructions: role_instructions.to_string(),
                user_content: user_content.to_string(),
                options: *options,
            });

            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::EmptyResponse))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> GatewayConfig {
        GatewayConfig {
            api_key: key.map(str::to_string),
            api_base: "https://example.invalid/v1/".into(),
            model: "gpt-4o-mini".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        assert!(matches!(
            OpenAiGateway::new(&config(None)),
            Err(GatewayError::Configuration(_))
        ));
        assert!(matches!(
            OpenAiGateway::new(&config(Some("  "))),
            Err(GatewayError::Configuration(_))
        ));
    }

    #[test]
    fn json_shape_requests_json_mode() {
        let gateway = OpenAiGateway::new(&config(Some("sk-test"))).unwrap();
        assert_eq!(gateway.api_base, "https://example.invalid/v1");

        let body = gateway.request_body(
            "role",
            "user",
            &CompletionOptions {
                temperature: 0.2,
                shape: OutputShape::Json,
            },
        );
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "user");

        let body = gateway.request_body(
            "role",
            "user",
            &CompletionOptions {
                temperature: 0.4,
                shape: OutputShape::Text,
            },
        );
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
    }
}
