use std::sync::Arc;

use crate::config::Messages;
use crate::line::Messenger;
use crate::line::event::TextEvent;
use crate::store::ReminderStore;

/// What an inbound message resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Acknowledged,
    Instructed,
}

/// Turns inbound text into state changes and a reply.
pub struct WebhookHandler {
    store: Arc<ReminderStore>,
    messenger: Arc<dyn Messenger>,
    keywords: Vec<String>,
    messages: Messages,
}

impl WebhookHandler {
    pub fn new(
        store: Arc<ReminderStore>,
        messenger: Arc<dyn Messenger>,
        keywords: &[String],
        messages: Messages,
    ) -> Self {
        let keywords = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        Self {
            store,
            messenger,
            keywords,
            messages,
        }
    }

    pub fn is_acknowledgment(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.keywords.iter().any(|k| text.contains(k.as_str()))
    }

    /// Update state for `user_id` and return the text to reply with.
    pub fn respond(&self, user_id: &str, text: &str) -> (Outcome, &str) {
        if self.is_acknowledgment(text) {
            let previous = self.store.get(user_id).map(|r| r.status);
            self.store.acknowledge(user_id);
            tracing::info!(user_id, ?previous, "Acknowledged");
            (Outcome::Acknowledged, self.messages.confirmation.as_str())
        } else {
            (Outcome::Instructed, self.messages.instruction.as_str())
        }
    }

    /// Handle one text event: exactly one reply is attempted. A failed reply
    /// is logged; the state change (if any) stands.
    pub async fn handle(&self, event: &TextEvent) -> Outcome {
        tracing::debug!(user_id = %event.user_id, "Message: {}", event.text);
        let (outcome, reply) = self.respond(&event.user_id, &event.text);
        if let Err(e) = self.messenger.reply(&event.reply_token, reply).await {
            tracing::error!(user_id = %event.user_id, "Failed to reply: {e:#}");
        }
        outcome
    }
}
