//! OpenAI-compatible chat completions client
//!
//! Defaults to OpenRouter. Every failure is classified so the caller's retry
//! policy knows whether another attempt can help.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::{Error, Result};

use super::llm::LlmProvider;

/// Chat-completions generation backend
pub struct OpenRouterLlm {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenRouterLlm {
    /// Create a new client
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Map an unsuccessful HTTP status to a generation error
///
/// Timeouts, rate limits and server errors are worth retrying; any other
/// client error means the request itself was rejected.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("Generation failed ({}): {}", status, body);
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Error::transient(message)
    } else {
        Error::permanent(message)
    }
}

/// Pull the first non-empty completion out of a response body
pub(crate) fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body)
        .map_err(|e| Error::transient(format!("Malformed generation response: {}", e)))?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| Error::transient("No completion in generation response"))
}

#[async_trait]
impl LlmProvider for OpenRouterLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let mut builder = self.client.post(self.endpoint()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::info!("Generating answer with model: {}", self.model);

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transient(format!("Generation request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transient(format!("Failed to read generation response: {}", e)))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        parse_completion(&body)
    }

    async fn health_check(&self) -> Result<bool> {
        let mut builder = self.client.get(format!("{}/models", self.base_url));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        match builder.send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    fn name(&self) -> &str {
        "openrouter"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "prompt rejected"),
            Error::GenerationPermanent(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            Error::GenerationPermanent(_)
        ));
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Tramadol is Schedule H1."}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "Tramadol is Schedule H1.");
    }

    #[test]
    fn test_malformed_or_empty_response_is_transient() {
        assert!(parse_completion("not json").unwrap_err().is_transient());
        assert!(parse_completion(r#"{"choices":[]}"#).unwrap_err().is_transient());
        assert!(parse_completion(r#"{"choices":[{"message":{"content":"  "}}]}"#)
            .unwrap_err()
            .is_transient());
    }
}
