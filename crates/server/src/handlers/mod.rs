pub mod chat;
pub mod dataset;
pub mod embedding;
pub mod general;
pub mod llm;
