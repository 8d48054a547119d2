//! LLM integration module
//!
//! This module provides the tool-calling LLM provider abstraction
//! and the Groq implementation used by the SQL agent.

pub mod client;
pub mod provider;

// Provider implementations
pub mod providers {
    pub mod groq;
}

// Re-exports
pub use provider::{
    GenerationParams, LLMProvider, LLMResponse, Message, MessageRole, ToolCall, ToolDefinition,
};
pub use providers::groq::GroqProvider;
