//! self-polish: token auth and a guided, LLM-driven self-improvement
//! questionnaire behind a small HTTP API.

pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod questionnaire;
pub mod server;
pub mod store;
pub mod users;
