use std::sync::Arc;

use botkun_ai::{CompletionError, MessageRole};
use botkun_core::{said_at_now, strip_mentions};
use botkun_store::{MessageStore, StorageError, ThreadWindow, Turn};
use thiserror::Error;

use crate::{CompletionGateway, MentionEvent, ReplyError, ReplySink};

#[derive(Debug, Error)]
/// Failure categories for one mention invocation. The category selects the
/// user-facing notice template.
pub enum HandlerError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error(transparent)]
    Reply(#[from] ReplyError),
}

#[derive(Debug, Clone, PartialEq)]
/// Terminal state of one mention invocation.
pub enum HandlerOutcome {
    /// Duplicate timeout-resend delivery; nothing was done.
    Skipped,
    Replied { reply: String },
    /// Handling failed; `notified` is true when the failure notice reached
    /// the thread.
    Failed { notified: bool },
}

/// Fixed user-visible notice for a failed invocation. Embeds the upstream
/// message id so a report can be correlated with logs.
pub(crate) fn failure_notice(error: &HandlerError, client_msg_id: &str) -> String {
    match error {
        HandlerError::Completion(_) => format!(
            "[system] The completion service could not produce a reply, possibly because the \
             conversation exceeded the model's context limit. Try starting a new thread. \
             client_msg_id={client_msg_id}"
        ),
        HandlerError::Storage(_) | HandlerError::Reply(_) => format!(
            "[system] An unexpected error occurred while handling this message. Try starting a \
             new thread. client_msg_id={client_msg_id}"
        ),
    }
}

/// Orchestrates one inbound mention end-to-end.
///
/// Stateless across invocations; the collaborating clients are constructed
/// once at process start and injected.
pub struct MentionHandler {
    store: Arc<dyn MessageStore>,
    window: ThreadWindow,
    gateway: CompletionGateway,
    replies: Arc<dyn ReplySink>,
}

impl MentionHandler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        window: ThreadWindow,
        gateway: CompletionGateway,
        replies: Arc<dyn ReplySink>,
    ) -> Self {
        Self {
            store,
            window,
            gateway,
            replies,
        }
    }

    /// Drives one mention to a terminal outcome. Failures after the
    /// duplicate-delivery check are logged and reported to the thread as a
    /// fixed notice; the handler never retries.
    pub async fn handle(&self, event: &MentionEvent) -> HandlerOutcome {
        if event.is_timeout_resend() {
            tracing::info!(
                client_msg_id = %event.client_msg_id,
                retry_num = event.retry_num,
                "ignoring transport-timeout resend"
            );
            return HandlerOutcome::Skipped;
        }

        match self.run(event).await {
            Ok(reply) => HandlerOutcome::Replied { reply },
            Err(error) => {
                tracing::error!(
                    client_msg_id = %event.client_msg_id,
                    %error,
                    "mention handling failed"
                );
                let notice = failure_notice(&error, &event.client_msg_id);
                let notified = match self
                    .replies
                    .post_reply(&event.channel, event.thread_ts(), &notice)
                    .await
                {
                    Ok(()) => true,
                    Err(post_error) => {
                        tracing::error!(
                            client_msg_id = %event.client_msg_id,
                            error = %post_error,
                            "failed to deliver failure notice"
                        );
                        false
                    }
                };
                HandlerOutcome::Failed { notified }
            }
        }
    }

    async fn run(&self, event: &MentionEvent) -> Result<String, HandlerError> {
        let thread_ts = event.thread_ts();

        let user_turn = Turn {
            id: Turn::compose_id(&event.client_msg_id, MessageRole::User, &event.user),
            thread_ts: thread_ts.to_string(),
            content: strip_mentions(&event.text),
            said_at: said_at_now(),
            role: MessageRole::User,
        };
        self.store.append(&user_turn).await?;

        let applied = self.window.apply(thread_ts).await?;
        for eviction_error in &applied.eviction_errors {
            tracing::warn!(%thread_ts, error = %eviction_error, "best-effort eviction delete failed");
        }
        if applied.evicted > 0 {
            tracing::info!(%thread_ts, evicted = applied.evicted, "evicted overflow turns");
        }

        let reply = self.gateway.reply_for(&applied.retained).await?;

        let assistant_turn = Turn {
            id: Turn::compose_id(&event.client_msg_id, MessageRole::Assistant, &event.user),
            thread_ts: thread_ts.to_string(),
            content: strip_mentions(&reply),
            said_at: said_at_now(),
            role: MessageRole::Assistant,
        };
        self.store.append(&assistant_turn).await?;

        self.replies.post_reply(&event.channel, thread_ts, &reply).await?;
        Ok(reply)
    }
}
