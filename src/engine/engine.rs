use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use tracing::{error, info};

use crate::config::GatewayConfig;
use crate::engine::backend::{HearingBackend, LocalBackend, RemoteBackend, UnavailableBackend};
use crate::engine::llm_client::OpenAiGateway;
use crate::engine::orchestrator::{HearingError, HearingOrchestrator, HearingState};
use crate::engine::protocol::{BackendChoice, EngineCommand, EngineResponse, EngineSettings};

/// Builds the backend for a settings choice. Failures yield a backend that refuses every step.
pub fn build_backend(choice: &BackendChoice, gateway: &GatewayConfig) -> Box<dyn HearingBackend> {
    match choice {
        BackendChoice::Local => match OpenAiGateway::new(gateway) {
            Ok(client) => Box::new(LocalBackend::new(Arc::new(client))),
            Err(err) => {
                error!(error = %err, "generation gateway unavailable");
                Box::new(UnavailableBackend::new(err.to_string()))
            }
        },
        BackendChoice::Remote { endpoint } => match RemoteBackend::new(endpoint.clone(), gateway.timeout) {
            Ok(remote) => Box::new(remote),
            Err(err) => {
                error!(error = %err, endpoint = %endpoint, "remote backend unavailable");
                Box::new(UnavailableBackend::new(err.to_string()))
            }
        },
    }
}

pub struct Engine {
    rx: Receiver<EngineCommand>,
    tx: Sender<EngineResponse>,
    orchestrator: HearingOrchestrator,
    gateway: GatewayConfig,
}

impl Engine {
    pub fn new(
        rx: Receiver<EngineCommand>,
        tx: Sender<EngineResponse>,
        gateway: GatewayConfig,
        backend: Box<dyn HearingBackend>,
    ) -> Self {
        let state_tx = tx.clone();
        let orchestrator = HearingOrchestrator::new(backend).with_listener(move |state| {
            let _ = state_tx.send(EngineResponse::StateChanged(state));
        });

        Self {
            rx,
            tx,
            orchestrator,
            gateway,
        }
    }

    pub fn run(&mut self) {
        while let Ok(cmd) = self.rx.recv() {
            match cmd {
                EngineCommand::StartHearing {
                    draft,
                    manual_category,
                } => {
                    let result = self.orchestrator.start(draft, manual_category);
                    self.publish_category();
                    self.publish(result);
                }

                EngineCommand::SubmitAnswer(answer) => {
                    let result = self.orchestrator.submit_answer(answer);
                    self.publish(result);
                }

                EngineCommand::FinishHearing => {
                    let result = self.orchestrator.finish_early();
                    self.publish(result);
                }

                EngineCommand::UpdateDraft(draft) => {
                    self.orchestrator.update_draft(draft);
                }

                EngineCommand::BuildReport => {
                    let result = self.orchestrator.build_report();
                    self.publish(result);
                }

                EngineCommand::Retry => {
                    let had_category = self.orchestrator.session().category.is_some();
                    let result = self.orchestrator.retry();
                    if !had_category {
                        self.publish_category();
                    }
                    self.publish(result);
                }

                EngineCommand::Reset => {
                    self.orchestrator.reset();
                    let _ = self.tx.send(EngineResponse::Transcript(Default::default()));
                }

                EngineCommand::EvaluateDirect {
                    draft,
                    report_text,
                    local,
                } => {
                    match self.orchestrator.evaluate_report(&draft, report_text, local) {
                        Ok(evaluation) => {
                            let _ = self.tx.send(EngineResponse::Evaluated {
                                report_text: None,
                                evaluation,
                            });
                        }
                        Err(err) => {
                            let _ = self.tx.send(EngineResponse::Failed {
                                detail: err.detail().map(str::to_string),
                                message: err.to_string(),
                                retryable: false,
                            });
                        }
                    }
                }

                EngineCommand::Configure(settings) => self.configure(settings),
            }
        }

        info!("engine channel closed; stopping");
    }

    fn configure(&mut self, settings: EngineSettings) {
        info!(backend = ?settings.backend, assembly = ?settings.assembly, "engine reconfigured");
        self.orchestrator
            .set_backend(build_backend(&settings.backend, &self.gateway));
        self.orchestrator.set_assembly(settings.assembly);
        self.orchestrator.set_include_education(settings.include_education);
    }

    fn publish_category(&self) {
        if let Some(decision) = self.orchestrator.session().category.clone() {
            let _ = self.tx.send(EngineResponse::Classified(decision));
        }
    }

    /// Sends whatever the UI needs to render the state the orchestrator just reached.
    fn publish(&self, result: Result<(), HearingError>) {
        let session = self.orchestrator.session();

        if let Err(err) = result {
            let (detail, retryable) = match &err {
                HearingError::Backend(inner) => (inner.detail().map(str::to_string), true),
                _ => (None, false),
            };
            let _ = self.tx.send(EngineResponse::Failed {
                message: err.to_string(),
                detail,
                retryable,
            });
            return;
        }

        match session.state {
            HearingState::AwaitingAnswer => {
                let _ = self.tx.send(EngineResponse::Transcript(session.qa_log.clone()));
                if let Some(question) = session.current_question.clone() {
                    let _ = self.tx.send(EngineResponse::Question(question));
                }
            }
            HearingState::ReadyToBuild => {
                let _ = self.tx.send(EngineResponse::Transcript(session.qa_log.clone()));
                let _ = self.tx.send(EngineResponse::HearingComplete);
            }
            HearingState::Done => {
                if let Some(evaluation) = session.evaluation.clone() {
                    let _ = self.tx.send(EngineResponse::Evaluated {
                        report_text: session.report_text.clone(),
                        evaluation,
                    });
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::llm_client::testing::ScriptedGateway;
    use crate::engine::llm_client::GatewayError;
    use crate::engine::local_score::evaluate_local;
    use crate::engine::orchestrator::ReportAssembly;
    use crate::model::category::EventCategory;
    use crate::model::hearing::Answer;
    use crate::model::report::ReportDraft;
    use std::sync::mpsc;
    use std::time::Duration;

    fn gateway_config() -> GatewayConfig {
        GatewayConfig {
            api_key: None,
            api_base: "https://example.invalid/v1".into(),
            model: "gpt-4o-mini".into(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Queues the commands, runs the engine to completion and returns every response.
    fn drive(gateway: ScriptedGateway, commands: Vec<EngineCommand>) -> Vec<EngineResponse> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (resp_tx, resp_rx) = mpsc::channel();

        let backend = Box::new(LocalBackend::new(Arc::new(gateway)));
        let mut engine = Engine::new(cmd_rx, resp_tx, gateway_config(), backend);

        for cmd in commands {
            cmd_tx.send(cmd).unwrap();
        }
        drop(cmd_tx);
        engine.run();
        drop(engine);

        resp_rx.iter().collect()
    }

    fn draft() -> ReportDraft {
        ReportDraft {
            summary: "夕食後に嘔吐あり".into(),
            ..Default::default()
        }
    }

    #[test]
    fn hearing_runs_through_the_engine() {
        let gateway = ScriptedGateway::new()
            .reply(r#"{"category":"acute_event","reason":"嘔吐"}"#)
            .reply(r#"{"done":false,"question":{"id":"q1","question":"嘔吐の回数は？","type":"text"}}"#)
            .reply(r#"{"done":true}"#);

        let responses = drive(
            gateway,
            vec![
                EngineCommand::StartHearing {
                    draft: draft(),
                    manual_category: None,
                },
                EngineCommand::SubmitAnswer(Answer {
                    selected: vec![],
                    free_text: "2回".into(),
                }),
            ],
        );

        assert!(responses.iter().any(|r| matches!(
            r,
            EngineResponse::Classified(d) if d.category == EventCategory::AcuteEvent
        )));
        assert!(responses
            .iter()
            .any(|r| matches!(r, EngineResponse::Question(q) if q.label == "嘔吐の回数は？")));
        assert_eq!(responses.last(), Some(&EngineResponse::HearingComplete));

        let transcript = responses
            .iter()
            .rev()
            .find_map(|r| match r {
                EngineResponse::Transcript(log) => Some(log.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.entries()[0].answer.free_text, "2回");
    }

    #[test]
    fn failures_are_reported_as_retryable() {
        let gateway = ScriptedGateway::new()
            .fail(GatewayError::Timeout(Duration::from_secs(60)))
            .reply(r#"{"category":"acute_event"}"#)
            .reply(r#"{"done":true}"#);

        let responses = drive(
            gateway,
            vec![
                EngineCommand::StartHearing {
                    draft: draft(),
                    manual_category: None,
                },
                EngineCommand::Retry,
            ],
        );

        assert!(responses.iter().any(|r| matches!(
            r,
            EngineResponse::Failed { retryable: true, .. }
        )));
        assert!(responses.contains(&EngineResponse::StateChanged(HearingState::Error)));
        assert_eq!(responses.last(), Some(&EngineResponse::HearingComplete));
    }

    #[test]
    fn configure_with_local_backend_and_no_key_fails_fast() {
        let gateway = ScriptedGateway::new().reply(r#"{"category":"operational"}"#);

        let responses = drive(
            gateway,
            vec![
                EngineCommand::Configure(EngineSettings {
                    backend: BackendChoice::Local,
                    assembly: ReportAssembly::LocalTemplate,
                    include_education: false,
                }),
                EngineCommand::StartHearing {
                    draft: draft(),
                    manual_category: None,
                },
            ],
        );

        match responses.last() {
            Some(EngineResponse::Failed { message, detail, .. }) => {
                assert_eq!(message, "AIサービスを利用できません（設定エラー）。");
                assert!(detail.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn direct_evaluation_leaves_hearing_idle() {
        let gateway = ScriptedGateway::new().reply("① 良い点\n明確\nスコア: 77\n<<SHORT>>転倒あり<<END_SHORT>>");

        let responses = drive(
            gateway,
            vec![EngineCommand::EvaluateDirect {
                draft: draft(),
                report_text: "■ 概要\n・夕食後に嘔吐".into(),
                local: evaluate_local(&draft()),
            }],
        );

        match responses.as_slice() {
            [EngineResponse::Evaluated {
                report_text: None,
                evaluation,
            }] => {
                assert_eq!(evaluation.ai_score, Some(77));
                assert_eq!(evaluation.short_text, "転倒あり");
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
