use std::sync::Arc;

use botkun_ai::{ChatCompletionClient, ChatMessage, ChatRequest, CompletionError};
use botkun_store::Turn;

/// Produces a reply for a retained window of turns.
///
/// Every request consists of one fixed system persona message followed by the
/// window's turns reduced to `{role, content}` pairs in chronological order.
pub struct CompletionGateway {
    client: Arc<dyn ChatCompletionClient>,
    model: String,
    persona: String,
}

impl CompletionGateway {
    pub fn new(client: Arc<dyn ChatCompletionClient>, model: impl Into<String>, persona: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
            persona: persona.into(),
        }
    }

    pub async fn reply_for(&self, window: &[Turn]) -> Result<String, CompletionError> {
        let mut messages = Vec::with_capacity(window.len() + 1);
        messages.push(ChatMessage::system(self.persona.clone()));
        messages.extend(window.iter().map(|turn| ChatMessage::new(turn.role, turn.content.clone())));

        let response = self
            .client
            .complete(ChatRequest {
                model: self.model.clone(),
                messages,
            })
            .await?;
        Ok(response.content)
    }
}
