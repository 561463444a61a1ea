pub mod engine;
pub mod protocol;
pub mod orchestrator;
pub mod backend;

pub mod prompt_builder;
pub mod llm_client;
pub mod response_parser;
pub mod flows;

pub mod local_score;
pub mod report_template;
