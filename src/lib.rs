pub mod config;
pub mod database;
pub mod errors;
pub mod ingest;
pub mod llm;
pub mod orchestrator;
pub mod sandbox;
pub mod server;
pub mod services;
pub mod storage;
