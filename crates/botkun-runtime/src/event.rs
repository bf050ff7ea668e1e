use serde::{Deserialize, Serialize};

// Slack resends an event with this retry reason when the original delivery hit
// its 3-second acknowledgement deadline; the first invocation is presumed to
// still be completing.
const HTTP_TIMEOUT_RETRY_REASON: &str = "http_timeout";

#[derive(Debug, Clone, Serialize, Deserialize)]
/// One inbound app-mention event as delivered by the messaging platform.
pub struct MentionEvent {
    pub channel: String,
    pub user: String,
    pub text: String,
    pub ts: String,
    #[serde(default)]
    pub thread_ts: Option<String>,
    pub client_msg_id: String,
    /// Mirrors `X-Slack-Retry-Num` when the delivery is a resend.
    #[serde(default)]
    pub retry_num: Option<u32>,
    /// Mirrors `X-Slack-Retry-Reason` when the delivery is a resend.
    #[serde(default)]
    pub retry_reason: Option<String>,
}

impl MentionEvent {
    /// The thread this event belongs to: the thread root, or the event's own
    /// timestamp when it starts a new thread.
    pub fn thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }

    /// True when this delivery is a transport-timeout resend of an event that
    /// is already being handled.
    pub fn is_timeout_resend(&self) -> bool {
        self.retry_num.is_some() && self.retry_reason.as_deref() == Some(HTTP_TIMEOUT_RETRY_REASON)
    }
}
