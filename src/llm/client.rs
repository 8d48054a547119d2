//! LLM HTTP Client
//!
//! A reusable HTTP client for chat-completion APIs, with retry logic,
//! exponential backoff, and error handling.

use crate::error::{Result, SqlAgentError};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Default maximum number of retry attempts
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default initial retry delay in milliseconds
const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;

/// Default timeout for HTTP requests (in seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for LLM API requests
#[derive(Clone)]
pub struct LLMHttpClient {
    /// Reqwest HTTP client
    client: Client,
    /// Maximum number of retry attempts
    max_retries: u32,
    /// Initial retry delay in milliseconds
    initial_delay_ms: u64,
}

impl LLMHttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
        })
    }

    /// Set the maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial retry delay
    pub fn with_retry_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    /// Make a POST request with retry logic
    ///
    /// Returns the response body of the first successful attempt.
    pub async fn post_with_retry<T: Serialize>(
        &self,
        url: &str,
        headers: HeaderMap,
        body: &T,
    ) -> Result<String> {
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .post(url)
                .headers(headers.clone())
                .json(body)
                .send()
                .await;

            let response = match response {
                Ok(response) => response,
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < self.max_retries => {
                    warn!(attempt, error = %e, "LLM request failed, retrying");
                    self.backoff(attempt).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(SqlAgentError::Http(e)),
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response.text().await?);
            }

            if self.should_retry(status, attempt) {
                warn!(attempt, status = status.as_u16(), "LLM API returned retryable status");
                self.backoff(attempt).await;
                attempt += 1;
                continue;
            }

            let response_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());

            return Err(SqlAgentError::LLMApiError {
                provider: "HTTP".to_string(),
                message: response_text,
                status: status.as_u16(),
            });
        }
    }

    async fn backoff(&self, attempt: u32) {
        tokio::time::sleep(Duration::from_millis(self.calculate_delay(attempt))).await;
    }

    /// Check if a request should be retried
    fn should_retry(&self, status: StatusCode, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }

        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    /// Calculate retry delay with exponential backoff
    fn calculate_delay(&self, attempt: u32) -> u64 {
        self.initial_delay_ms * 2_u64.pow(attempt)
    }

    /// Build bearer-auth JSON headers for API requests
    pub fn build_headers(api_key: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| SqlAgentError::InvalidHeader("API key contains invalid characters".to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        Ok(headers)
    }
}
