//! SQL Agent Chat Library
//!
//! Natural-language questions over SQLite, MySQL and PostgreSQL databases,
//! answered by a tool-calling LLM agent that may only run guarded SELECT
//! statements. The main binary is in src/main.rs.

pub mod agent;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod llm;
pub mod logging;
