//! Webhook payload types.
//!
//! Only the fields the bot reads are modelled; everything else in the
//! envelope is ignored by serde.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WebhookBody {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<Source>,
    #[serde(default)]
    pub message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventMessage {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// A text message from an identifiable user, with a token to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub user_id: String,
    pub reply_token: String,
    pub text: String,
}

impl Event {
    pub fn as_text(&self) -> Option<TextEvent> {
        if self.type_ != "message" {
            return None;
        }
        let message = self.message.as_ref()?;
        if message.type_ != "text" {
            return None;
        }
        Some(TextEvent {
            user_id: self.source.as_ref()?.user_id.clone()?,
            reply_token: self.reply_token.clone()?,
            text: message.text.clone()?,
        })
    }
}

pub fn parse(body: &[u8]) -> serde_json::Result<WebhookBody> {
    serde_json::from_slice(body)
}
