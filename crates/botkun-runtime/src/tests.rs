//! Tests for mention orchestration, the gateway request shape, and the Slack
//! reply client.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use botkun_ai::{ChatCompletionClient, ChatRequest, ChatResponse, CompletionError, MessageRole};
use botkun_store::{MessageStore, SqliteMessageStore, ThreadWindow, Turn, DEFAULT_WINDOW_CAPACITY};
use httpmock::prelude::*;
use serde_json::json;
use tempfile::tempdir;

use super::handler::failure_notice;
use super::*;

struct RecordingCompletionClient {
    reply: String,
    requests: Mutex<Vec<ChatRequest>>,
}

impl RecordingCompletionClient {
    fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatCompletionClient for RecordingCompletionClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, CompletionError> {
        self.requests.lock().expect("requests lock").push(request);
        Ok(ChatResponse {
            content: self.reply.clone(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

struct FailingCompletionClient;

#[async_trait]
impl ChatCompletionClient for FailingCompletionClient {
    async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, CompletionError> {
        Err(CompletionError::NoChoices)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PostedReply {
    channel: String,
    thread_ts: String,
    text: String,
}

#[derive(Default)]
struct RecordingReplySink {
    posted: Mutex<Vec<PostedReply>>,
}

impl RecordingReplySink {
    fn posted(&self) -> Vec<PostedReply> {
        self.posted.lock().expect("posted lock").clone()
    }
}

#[async_trait]
impl ReplySink for RecordingReplySink {
    async fn post_reply(&self, channel: &str, thread_ts: &str, text: &str) -> Result<(), ReplyError> {
        self.posted.lock().expect("posted lock").push(PostedReply {
            channel: channel.to_string(),
            thread_ts: thread_ts.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }
}

fn mention_event(text: &str) -> MentionEvent {
    MentionEvent {
        channel: "C123".to_string(),
        user: "U777".to_string(),
        text: text.to_string(),
        ts: "1700000100.000200".to_string(),
        thread_ts: Some("1700000000.000100".to_string()),
        client_msg_id: "cm-0001".to_string(),
        retry_num: None,
        retry_reason: None,
    }
}

fn seeded_turn(thread_ts: &str, index: u32) -> Turn {
    let role = if index % 2 == 1 { MessageRole::User } else { MessageRole::Assistant };
    Turn {
        id: format!("seed-{index:03}#{}#U777", role.as_str()),
        thread_ts: thread_ts.to_string(),
        content: format!("turn {index}"),
        said_at: format!("2024-03-07T00:{:02}:{:02}.000000000Z", index / 60, index % 60),
        role,
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: Arc<SqliteMessageStore>,
    client: Arc<RecordingCompletionClient>,
    sink: Arc<RecordingReplySink>,
    handler: MentionHandler,
}

fn harness_with_client(client: Arc<dyn ChatCompletionClient>, recording: Option<Arc<RecordingCompletionClient>>) -> Harness {
    let dir = tempdir().expect("tempdir");
    let store = Arc::new(SqliteMessageStore::open(&dir.path().join("turns.sqlite3")).expect("open store"));
    let sink = Arc::new(RecordingReplySink::default());
    let handler = MentionHandler::new(
        store.clone(),
        ThreadWindow::new(store.clone(), DEFAULT_WINDOW_CAPACITY),
        CompletionGateway::new(client, "gpt-4o-mini", "You are botkun."),
        sink.clone(),
    );
    Harness {
        _dir: dir,
        store,
        client: recording.unwrap_or_else(|| Arc::new(RecordingCompletionClient::new("unused"))),
        sink,
        handler,
    }
}

fn harness(reply: &str) -> Harness {
    let client = Arc::new(RecordingCompletionClient::new(reply));
    harness_with_client(client.clone(), Some(client))
}

#[test]
fn thread_ts_falls_back_to_event_ts() {
    let mut event = mention_event("hi");
    assert_eq!(event.thread_ts(), "1700000000.000100");
    event.thread_ts = None;
    assert_eq!(event.thread_ts(), "1700000100.000200");
}

#[test]
fn timeout_resend_requires_both_retry_fields() {
    let mut event = mention_event("hi");
    assert!(!event.is_timeout_resend());

    event.retry_num = Some(1);
    assert!(!event.is_timeout_resend());

    event.retry_reason = Some("http_timeout".to_string());
    assert!(event.is_timeout_resend());

    event.retry_reason = Some("rate_limited".to_string());
    assert!(!event.is_timeout_resend());
}

#[tokio::test]
async fn duplicate_timeout_resend_is_a_silent_no_op() {
    let harness = harness("never sent");
    let mut event = mention_event("<@UBOT> hello");
    event.retry_num = Some(1);
    event.retry_reason = Some("http_timeout".to_string());

    let outcome = harness.handler.handle(&event).await;

    assert_eq!(outcome, HandlerOutcome::Skipped);
    assert!(harness.client.requests().is_empty());
    assert!(harness.sink.posted().is_empty());
    let stored = harness.store.list_by_thread(event.thread_ts()).await.expect("list");
    assert!(stored.is_empty());
}

#[tokio::test]
async fn mention_reply_round_trip_persists_both_turns() {
    let harness = harness("hello <@U777>, nice to meet you ");
    let event = mention_event("  <@UBOT> introduce yourself  ");

    let outcome = harness.handler.handle(&event).await;

    assert_eq!(
        outcome,
        HandlerOutcome::Replied {
            reply: "hello <@U777>, nice to meet you ".to_string()
        }
    );

    let mut stored = harness.store.list_by_thread("1700000000.000100").await.expect("list");
    stored.sort_by(|a, b| a.said_at.cmp(&b.said_at));
    assert_eq!(stored.len(), 2);

    // Persisted content is mention-stripped and trimmed on both sides.
    assert_eq!(stored[0].id, "cm-0001#user#U777");
    assert_eq!(stored[0].role, MessageRole::User);
    assert_eq!(stored[0].content, "introduce yourself");
    assert_eq!(stored[1].id, "cm-0001#assistant#U777");
    assert_eq!(stored[1].role, MessageRole::Assistant);
    assert_eq!(stored[1].content, "hello , nice to meet you");

    // The posted reply carries the raw gateway text.
    assert_eq!(
        harness.sink.posted(),
        vec![PostedReply {
            channel: "C123".to_string(),
            thread_ts: "1700000000.000100".to_string(),
            text: "hello <@U777>, nice to meet you ".to_string(),
        }]
    );
}

#[tokio::test]
async fn full_thread_window_is_evicted_and_forwarded_in_order() {
    let harness = harness("the twelfth reply");
    let thread_ts = "1700000000.000100";
    for index in 1..=12 {
        harness.store.append(&seeded_turn(thread_ts, index)).await.expect("seed");
    }

    let event = mention_event("<@UBOT> what did we decide?");
    let outcome = harness.handler.handle(&event).await;
    assert!(matches!(outcome, HandlerOutcome::Replied { .. }));

    // 12 seeded + new user turn = 13; the three oldest are deleted, then the
    // assistant turn lands on top of the retained ten.
    let mut stored = harness.store.list_by_thread(thread_ts).await.expect("list");
    stored.sort_by(|a, b| a.said_at.cmp(&b.said_at));
    assert_eq!(stored.len(), 11);
    assert_eq!(stored[0].content, "turn 4");
    assert_eq!(stored[8].content, "turn 12");
    assert_eq!(stored[9].content, "what did we decide?");
    assert_eq!(stored[10].content, "the twelfth reply");

    // The completion request was the persona followed by t4..t13 in ascending
    // order, reduced to {role, content}.
    let requests = harness.client.requests();
    assert_eq!(requests.len(), 1);
    let messages = &requests[0].messages;
    assert_eq!(messages.len(), 11);
    assert_eq!(messages[0].role, MessageRole::System);
    assert_eq!(messages[0].content, "You are botkun.");
    for (offset, index) in (4..=12).enumerate() {
        assert_eq!(messages[offset + 1].content, format!("turn {index}"));
        let expected_role = if index % 2 == 1 { MessageRole::User } else { MessageRole::Assistant };
        assert_eq!(messages[offset + 1].role, expected_role);
    }
    assert_eq!(messages[10].content, "what did we decide?");
    assert_eq!(messages[10].role, MessageRole::User);
}

#[tokio::test]
async fn completion_failure_posts_notice_and_persists_no_assistant_turn() {
    let harness = harness_with_client(Arc::new(FailingCompletionClient), None);
    let event = mention_event("<@UBOT> hello");

    let outcome = harness.handler.handle(&event).await;
    assert_eq!(outcome, HandlerOutcome::Failed { notified: true });

    let stored = harness.store.list_by_thread(event.thread_ts()).await.expect("list");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].role, MessageRole::User);

    let posted = harness.sink.posted();
    assert_eq!(posted.len(), 1);
    let expected = failure_notice(
        &HandlerError::Completion(CompletionError::NoChoices),
        "cm-0001",
    );
    assert_eq!(posted[0].text, expected);
    assert!(posted[0].text.contains("client_msg_id=cm-0001"));
}

#[tokio::test]
async fn new_thread_uses_event_ts_as_thread_root() {
    let harness = harness("fresh thread reply");
    let mut event = mention_event("<@UBOT> hi");
    event.thread_ts = None;

    harness.handler.handle(&event).await;

    let stored = harness.store.list_by_thread("1700000100.000200").await.expect("list");
    assert_eq!(stored.len(), 2);
    assert_eq!(harness.sink.posted()[0].thread_ts, "1700000100.000200");
}

#[tokio::test]
async fn slack_reply_client_posts_to_chat_post_message() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/chat.postMessage")
            .header("authorization", "Bearer xoxb-test")
            .json_body(json!({
                "channel": "C123",
                "text": "hello thread",
                "thread_ts": "1700000000.000100",
            }));
        then.status(200).json_body(json!({"ok": true, "ts": "1700000101.000300"}));
    });

    let client = SlackReplyClient::new(server.base_url(), "xoxb-test", 3_000).expect("client");
    client
        .post_reply("C123", "1700000000.000100", "hello thread")
        .await
        .expect("post");
    mock.assert();
}

#[tokio::test]
async fn slack_reply_client_surfaces_ok_false() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200).json_body(json!({"ok": false, "error": "channel_not_found"}));
    });

    let client = SlackReplyClient::new(server.base_url(), "xoxb-test", 3_000).expect("client");
    let error = client
        .post_reply("C404", "1700000000.000100", "hello")
        .await
        .expect_err("rejected");
    match error {
        ReplyError::Rejected(reason) => assert_eq!(reason, "channel_not_found"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn slack_reply_client_rejects_empty_token() {
    let result = SlackReplyClient::new("https://slack.com/api", "   ", 3_000);
    assert!(matches!(result, Err(ReplyError::InvalidToken)));
}

#[tokio::test]
async fn gateway_prepends_persona_and_preserves_order() {
    let client = Arc::new(RecordingCompletionClient::new("ok"));
    let gateway = CompletionGateway::new(client.clone(), "gpt-4o-mini", "persona text");
    let window = vec![seeded_turn("t", 1), seeded_turn("t", 2)];

    let reply = gateway.reply_for(&window).await.expect("reply");
    assert_eq!(reply, "ok");

    let requests = client.requests();
    assert_eq!(requests[0].model, "gpt-4o-mini");
    assert_eq!(requests[0].messages[0].role, MessageRole::System);
    assert_eq!(requests[0].messages[0].content, "persona text");
    assert_eq!(requests[0].messages[1].content, "turn 1");
    assert_eq!(requests[0].messages[2].content, "turn 2");
}
