//! Groq API Provider
//!
//! This module implements the LLMProvider trait for Groq's OpenAI-compatible
//! chat completions endpoint, including function-style tool calling.

use crate::config::env::{DEFAULT_GROQ_BASE_URL, DEFAULT_GROQ_MODEL};
use crate::error::{Result, SqlAgentError};
use crate::llm::client::LLMHttpClient;
use crate::llm::provider::{
    GenerationParams, LLMProvider, LLMResponse, Message, MessageRole, ToolCall, ToolDefinition,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Groq provider request timeout (seconds)
const GROQ_TIMEOUT_SECS: u64 = 30;

/// Groq provider retry budget
const GROQ_MAX_RETRIES: u32 = 2;

/// Groq API provider
pub struct GroqProvider {
    /// API key for authentication
    api_key: String,
    /// Model to use (e.g., "llama3-70b-8192")
    model: String,
    /// Chat completions endpoint
    base_url: String,
    /// HTTP client for making requests
    client: LLMHttpClient,
    /// Maximum tokens for generation
    max_tokens: u32,
}

impl GroqProvider {
    /// Create a new Groq provider
    ///
    /// # Arguments
    /// * `api_key` - Groq API key
    /// * `model` - Model identifier (defaults to llama3-70b-8192)
    /// * `base_url` - Endpoint override (defaults to Groq's public API)
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self> {
        let client = LLMHttpClient::with_timeout(GROQ_TIMEOUT_SECS)?
            .with_max_retries(GROQ_MAX_RETRIES);

        Ok(Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_GROQ_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
            client,
            max_tokens: 4096,
        })
    }

    /// Convert our Message format to Groq format (OpenAI-compatible)
    fn convert_messages(messages: &[Message]) -> Vec<GroqMessage> {
        messages
            .iter()
            .map(|msg| {
                let tool_calls = if msg.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        msg.tool_calls
                            .iter()
                            .map(|call| GroqToolCall {
                                id: call.id.clone(),
                                kind: "function".to_string(),
                                function: GroqFunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                // An assistant turn made only of tool calls carries null content
                let content = if msg.role == MessageRole::Assistant
                    && msg.content.is_empty()
                    && tool_calls.is_some()
                {
                    None
                } else {
                    Some(msg.content.clone())
                };

                GroqMessage {
                    role: match msg.role {
                        MessageRole::User => "user",
                        MessageRole::Assistant => "assistant",
                        MessageRole::System => "system",
                        MessageRole::Tool => "tool",
                    }
                    .to_string(),
                    content,
                    tool_calls,
                    tool_call_id: msg.tool_call_id.clone(),
                }
            })
            .collect()
    }

    fn convert_tools(tools: &[ToolDefinition]) -> Option<Vec<GroqTool>> {
        if tools.is_empty() {
            return None;
        }
        Some(
            tools
                .iter()
                .map(|tool| GroqTool {
                    kind: "function".to_string(),
                    function: GroqFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
        )
    }

    /// Build the request body for one completion
    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: Option<&GenerationParams>,
    ) -> GroqRequest {
        let defaults = GenerationParams::default();
        let params = params.unwrap_or(&defaults);
        let tools = Self::convert_tools(tools);

        GroqRequest {
            model: self.model.clone(),
            messages: Self::convert_messages(messages),
            tool_choice: tools.as_ref().map(|_| "auto".to_string()),
            tools,
            max_tokens: Some(params.max_tokens.unwrap_or(self.max_tokens)),
            temperature: params.temperature,
            top_p: params.top_p,
            stop: params.stop_sequences.clone(),
        }
    }

    /// Turn a raw completion body into our response type
    fn parse_response(response_text: &str) -> Result<LLMResponse> {
        let groq_response: GroqResponse =
            serde_json::from_str(response_text).map_err(|e| SqlAgentError::LLMApiError {
                provider: "Groq".to_string(),
                message: format!("Failed to parse response: {}", e),
                status: 0,
            })?;

        let choice = groq_response.choices.into_iter().next().ok_or_else(|| {
            SqlAgentError::LLMProvider("Groq returned no choices".to_string())
        })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect();

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            model: Some(groq_response.model),
            input_tokens: groq_response.usage.as_ref().map(|u| u.prompt_tokens),
            output_tokens: groq_response.usage.as_ref().map(|u| u.completion_tokens),
            total_tokens: groq_response.usage.as_ref().map(|u| u.total_tokens),
            finish_reason: choice.finish_reason,
        })
    }
}

#[async_trait]
impl LLMProvider for GroqProvider {
    /// Generate the next assistant turn from the Groq API
    async fn generate(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        params: Option<&GenerationParams>,
    ) -> Result<LLMResponse> {
        self.validate_config()?;

        let request = self.build_request(messages, tools, params);
        let headers = LLMHttpClient::build_headers(&self.api_key)?;
        let response_text = self
            .client
            .post_with_retry(&self.base_url, headers, &request)
            .await
            .map_err(|e| match e {
                SqlAgentError::LLMApiError {
                    message, status, ..
                } => SqlAgentError::LLMApiError {
                    provider: "Groq".to_string(),
                    message,
                    status,
                },
                other => other,
            })?;

        Self::parse_response(&response_text)
    }

    /// Get provider name
    fn provider_name(&self) -> &str {
        "Groq"
    }

    fn model(&self) -> &str {
        &self.model
    }

    /// Check if API key is set
    fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// Groq API request format (OpenAI-compatible)
#[derive(Debug, Serialize)]
struct GroqRequest {
    model: String,
    messages: Vec<GroqMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GroqTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// Groq API message format
#[derive(Debug, Serialize, Clone)]
struct GroqMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<GroqToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Clone)]
struct GroqTool {
    #[serde(rename = "type")]
    kind: String,
    function: GroqFunction,
}

#[derive(Debug, Serialize, Clone)]
struct GroqFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

/// Tool call, both in requests (history) and responses
#[derive(Debug, Serialize, Deserialize, Clone)]
struct GroqToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: GroqFunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct GroqFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Groq API response format (OpenAI-compatible)
#[derive(Debug, Deserialize)]
struct GroqResponse {
    model: String,
    choices: Vec<GroqChoice>,
    usage: Option<GroqUsage>,
}

/// Choice in Groq response
#[derive(Debug, Deserialize)]
struct GroqChoice {
    message: GroqMessageResponse,
    finish_reason: Option<String>,
}

/// Message in Groq response
#[derive(Debug, Deserialize)]
struct GroqMessageResponse {
    content: Option<String>,
    tool_calls: Option<Vec<GroqToolCall>>,
}

/// Token usage information
#[derive(Debug, Deserialize)]
struct GroqUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
