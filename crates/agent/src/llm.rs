use std::time::Duration;

use async_trait::async_trait;
use pricebot_core::config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("completion endpoint not configured: {0}")]
    Config(String),
    #[error("completion transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("completion endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("completion response missing `{field}`")]
    MalformedResponse { field: &'static str },
}

/// One item of the `input` array sent to the responses endpoint.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputItem {
    Message { role: String, content: String },
    FunctionCallOutput { call_id: String, output: String },
}

impl InputItem {
    pub fn system(content: impl Into<String>) -> Self {
        Self::Message { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::Message { role: "user".to_string(), content: content.into() }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CompletionRequest {
    pub input: Vec<InputItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
}

/// Seam between the driver and the hosted model. Tests script the raw JSON
/// bodies; production goes through `ResponsesClient`.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn create(&self, request: CompletionRequest) -> Result<Value, LlmError>;
}

/// HTTP client for an OpenAI-compatible responses endpoint.
pub struct ResponsesClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
    deployment: String,
    max_output_tokens: u32,
}

impl ResponsesClient {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| LlmError::Config("llm.endpoint is not set".to_string()))?
            .trim_end_matches('/')
            .to_string();
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| LlmError::Config("llm.api_key is not set".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            deployment: config.deployment.clone(),
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn responses_url(&self) -> String {
        format!("{}/openai/v1/responses", self.endpoint)
    }
}

#[async_trait]
impl CompletionClient for ResponsesClient {
    async fn create(&self, request: CompletionRequest) -> Result<Value, LlmError> {
        let mut body = serde_json::json!({
            "model": self.deployment,
            "input": request.input,
            "tools": [crate::tools::price_query_tool()],
            "max_output_tokens": self.max_output_tokens,
        });
        if let Some(previous) = request.previous_response_id {
            body["previous_response_id"] = Value::String(previous);
        }

        let response = self
            .http
            .post(self.responses_url())
            .header("api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        Ok(response.json::<Value>().await?)
    }
}
