//! Mention-event orchestration: one inbound mention in, one thread reply out.
//!
//! The handler persists the user turn, applies the bounded window, calls the
//! completion gateway, persists the assistant turn, and posts the reply. Any
//! failure after the duplicate-delivery check is converted into a fixed
//! user-facing notice in the originating thread.

mod event;
mod gateway;
mod handler;
mod reply;

pub use event::MentionEvent;
pub use gateway::CompletionGateway;
pub use handler::{HandlerError, HandlerOutcome, MentionHandler};
pub use reply::{ReplyError, ReplySink, SlackReplyClient};

#[cfg(test)]
mod tests;
