use crate::error::ClaudeError;
use crate::types::{ErrorEnvelope, InputMessage, MessagesRequest, MessagesResponse};
use crate::Result;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClaudeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ClaudeClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: &str) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ClaudeError::MissingApiKey);
        }
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// `POST /v1/messages`.
    pub async fn create_message(&self, request: &MessagesRequest) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!(model = %request.model, max_tokens = request.max_tokens, "Sending request to Anthropic API");

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .ok()
                .filter(|m| !m.is_empty())
                .unwrap_or(body);
            return Err(ClaudeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.json().await?)
    }

    /// Send a single user prompt and return the first text block of the reply.
    pub async fn complete(&self, model: &str, max_tokens: u32, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: model.to_string(),
            max_tokens,
            messages: vec![InputMessage::user(prompt)],
            system: None,
        };
        let response = self.create_message(&request).await?;
        response
            .first_text()
            .map(str::to_string)
            .ok_or(ClaudeError::EmptyResponse)
    }
}
