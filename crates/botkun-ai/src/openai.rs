use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;

use crate::{ChatCompletionClient, ChatRequest, ChatResponse, CompletionError};

const ERROR_BODY_LIMIT: usize = 600;

fn truncate_for_error(body: &str) -> String {
    if body.len() <= ERROR_BODY_LIMIT {
        return body.to_string();
    }
    let mut cut = ERROR_BODY_LIMIT;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &body[..cut])
}

#[derive(Debug, Clone)]
/// Connection settings for an OpenAI-compatible chat-completion endpoint.
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone)]
/// `ChatCompletionClient` over the `/chat/completions` HTTP surface.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_base: String,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, CompletionError> {
        if config.api_key.trim().is_empty() {
            return Err(CompletionError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let bearer = format!("Bearer {}", config.api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|e| CompletionError::InvalidResponse(format!("invalid API key header: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionHttpResponse {
    #[serde(default)]
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoice {
    message: ChatCompletionChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl ChatCompletionClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, CompletionError> {
        let payload = json!({
            "model": request.model,
            "messages": request.messages,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::HttpStatus {
                status: status.as_u16(),
                body: truncate_for_error(&body),
            });
        }

        let parsed: ChatCompletionHttpResponse = serde_json::from_str(&body)?;
        let choice = parsed.choices.into_iter().next().ok_or(CompletionError::NoChoices)?;
        let content = choice
            .message
            .content
            .ok_or_else(|| CompletionError::InvalidResponse("first choice has no message content".to_string()))?;

        Ok(ChatResponse {
            content,
            finish_reason: choice.finish_reason,
        })
    }
}
