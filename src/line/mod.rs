pub mod event;
pub mod signature;

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;

use crate::config::LineConfig;

/// Outbound side of the chat platform.
#[async_trait::async_trait]
pub trait Messenger: Send + Sync {
    /// Answer an inbound event. `reply_token` is only valid for that event.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;
    /// Send an unsolicited message to a user.
    async fn push(&self, user_id: &str, text: &str) -> Result<()>;
}

/// Client for the LINE Messaging API.
pub struct LineClient {
    client: Client,
    base_url: String,
    access_token: String,
}

// --- Request types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    messages: [TextMessage<'a>; 1],
}

#[derive(Serialize)]
struct TextMessage<'a> {
    #[serde(rename = "type")]
    type_: &'static str,
    text: &'a str,
}

impl<'a> TextMessage<'a> {
    fn new(text: &'a str) -> Self {
        Self { type_: "text", text }
    }
}

impl LineClient {
    pub fn new(config: &LineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            access_token: config.channel_access_token.clone(),
        })
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Failed to call {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("LINE API error ({}): {}", status, body);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl Messenger for LineClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let body = ReplyRequest {
            reply_token,
            messages: [TextMessage::new(text)],
        };
        self.post("/v2/bot/message/reply", &body).await
    }

    async fn push(&self, user_id: &str, text: &str) -> Result<()> {
        let body = PushRequest {
            to: user_id,
            messages: [TextMessage::new(text)],
        };
        self.post("/v2/bot/message/push", &body).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use anyhow::Result;

    use super::Messenger;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Sent {
        Reply { token: String, text: String },
        Push { to: String, text: String },
    }

    /// Records every call; pushes to users in `failing` return an error
    /// after being recorded as attempted.
    #[derive(Default)]
    pub struct RecordingMessenger {
        pub sent: Mutex<Vec<Sent>>,
        pub failing: HashSet<String>,
    }

    impl RecordingMessenger {
        pub fn failing_for(users: &[&str]) -> Self {
            Self {
                sent: Mutex::default(),
                failing: users.iter().map(|u| u.to_string()).collect(),
            }
        }

        pub fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        pub fn pushes_to(&self, user: &str) -> usize {
            self.sent()
                .iter()
                .filter(|s| matches!(s, Sent::Push { to, .. } if to == user))
                .count()
        }
    }

    #[async_trait::async_trait]
    impl Messenger for RecordingMessenger {
        async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Reply {
                token: reply_token.to_string(),
                text: text.to_string(),
            });
            if self.failing.contains(reply_token) {
                anyhow::bail!("reply to {reply_token} refused");
            }
            Ok(())
        }

        async fn push(&self, user_id: &str, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Push {
                to: user_id.to_string(),
                text: text.to_string(),
            });
            if self.failing.contains(user_id) {
                anyhow::bail!("push to {user_id} refused");
            }
            Ok(())
        }
    }
}
