pub mod credentials;
pub mod export;
pub mod generator;
pub mod llm;
pub mod schema;
pub mod workflow;
