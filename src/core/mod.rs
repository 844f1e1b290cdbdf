pub mod chain;
pub mod config;
pub mod idea;
pub mod llm;
pub mod pipeline;
pub mod terminal;
