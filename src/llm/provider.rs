//! LLM Provider Trait
//!
//! This module defines the trait-based abstraction for chat-completion
//! providers that support tool calling, plus the message and tool types
//! exchanged with them.

use crate::error::{Result, SqlAgentError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// LLM message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// System message (sets behavior/context)
    System,
    /// User message (query or input)
    User,
    /// Assistant message (response or tool calls)
    Assistant,
    /// Result of a tool call
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back with the result
    pub id: String,
    /// Tool name
    pub name: String,
    /// Raw JSON arguments as produced by the model
    pub arguments: String,
}

impl ToolCall {
    /// Parse the arguments as JSON
    pub fn parsed_arguments(&self) -> Result<serde_json::Value> {
        if self.arguments.trim().is_empty() {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        Ok(serde_json::from_str(&self.arguments)?)
    }
}

/// A tool the model may call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// LLM message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: MessageRole,
    /// Message content
    pub content: String,
    /// Tool calls made by an assistant message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool messages, the call being answered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    /// Assistant turn that requested tool calls
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut message = Self::new(MessageRole::Assistant, content);
        message.tool_calls = tool_calls;
        message
    }

    /// Result of a tool call
    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::new(MessageRole::Tool, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }
}

/// LLM response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LLMResponse {
    /// Generated text content
    pub content: String,
    /// Tool calls requested by the model
    pub tool_calls: Vec<ToolCall>,
    /// Number of tokens used (input)
    pub input_tokens: Option<u32>,
    /// Number of tokens used (output)
    pub output_tokens: Option<u32>,
    /// Total tokens used
    pub total_tokens: Option<u32>,
    /// Model used for generation
    pub model: Option<String>,
    /// Finish reason (e.g., "stop", "tool_calls")
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    /// Create a new plain-text response
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Create a response that only requests tool calls
    pub fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            finish_reason: Some("tool_calls".to_string()),
            ..Default::default()
        }
    }

    /// Get total token count if available
    pub fn get_total_tokens(&self) -> Option<u32> {
        self.total_tokens.or_else(|| {
            self.input_tokens
                .and_then(|input| self.output_tokens.map(|output| input + output))
        })
    }
}

/// LLM generation parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 1.0, higher = more random)
    pub temperature: Option<f32>,
    /// Top-p sampling (0.0 - 1.0)
    pub top_p: Option<f32>,
    /// Stop sequences
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        // SQL generation wants deterministic output
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.0),
            top_p: None,
            stop_sequences: None,
        }
    }
}

impl GenerationParams {
    /// Create new default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Trait for LLM providers
///
/// Implementations send a conversation plus the available tools to a chat
/// completion API and return either text, tool calls, or both.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate the next assistant turn
    ///
    /// # Arguments
    /// * `messages` - Conversation so far, including tool results
    /// * `tools` - Tools the model may call (empty for plain chat)
    /// * `params` - Generation parameters
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse>;

    /// Get the provider name
    fn provider_name(&self) -> &str;

    /// Get the model identifier
    fn model(&self) -> &str;

    /// Check if the provider has an API key configured
    fn has_api_key(&self) -> bool;

    /// Validate the provider configuration
    fn validate_config(&self) -> Result<()> {
        if !self.has_api_key() {
            return Err(SqlAgentError::LLMApiKeyMissing(
                self.provider_name().to_string(),
            ));
        }
        Ok(())
    }
}
