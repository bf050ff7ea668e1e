use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
/// Failures while posting a reply back to the platform.
pub enum ReplyError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("slack responded with status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("slack rejected chat.postMessage: {0}")]
    Rejected(String),
    #[error("invalid bot token header")]
    InvalidToken,
}

#[async_trait]
/// Outbound "post reply" capability of the messaging platform.
pub trait ReplySink: Send + Sync {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<(), ReplyError>;
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatPostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// `ReplySink` over the Slack Web API `chat.postMessage` call.
pub struct SlackReplyClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
}

impl SlackReplyClient {
    pub fn new(api_base: impl Into<String>, bot_token: impl Into<String>, request_timeout_ms: u64) -> Result<Self, ReplyError> {
        let bot_token = bot_token.into().trim().to_string();
        if bot_token.is_empty() {
            return Err(ReplyError::InvalidToken);
        }

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            bot_token,
        })
    }
}

#[async_trait]
impl ReplySink for SlackReplyClient {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<(), ReplyError> {
        let response = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&json!({
                "channel": channel,
                "text": text,
                "thread_ts": thread_ts,
            }))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ReplyError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SlackChatPostMessageResponse =
            serde_json::from_str(&body).map_err(|e| ReplyError::Rejected(format!("unparseable response: {e}")))?;
        if !parsed.ok {
            return Err(ReplyError::Rejected(
                parsed.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(())
    }
}
