pub mod category;
pub mod evaluation;
pub mod flow;
pub mod hearing;
pub mod llm_decode;
pub mod report;
