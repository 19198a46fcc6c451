//! Messaging side effects.
//!
//! The orchestrator triggers sends and reads through an [`ActionAdapter`].
//! [`SlackAdapter`] talks to the Slack Web API; [`DisabledActions`] reports
//! itself unavailable and refuses every call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ActionsConfig;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("messaging integration is not configured")]
    Unavailable,
    #[error("channel not found: {0}")]
    UnknownChannel(String),
    #[error("http error: {0}")]
    Http(String),
    /// The API answered but rejected the call.
    #[error("api error: {0}")]
    Api(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub channel: String,
    pub ts: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    pub user: String,
    pub text: String,
    pub ts: String,
}

#[async_trait]
pub trait ActionAdapter: Send + Sync {
    /// Whether the integration is configured. Drives capability disclosure
    /// in the prompt and the action follow-up suggestion.
    fn is_available(&self) -> bool;

    async fn send(&self, channel: &str, text: &str) -> Result<SendReceipt, ActionError>;

    /// Most recent messages first, at most `limit`.
    async fn read(&self, channel: &str, limit: u32) -> Result<Vec<ChannelMessage>, ActionError>;
}

pub fn create_adapter(config: &ActionsConfig) -> anyhow::Result<Arc<dyn ActionAdapter>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledActions)),
        "slack" => match std::env::var("SLACK_BOT_TOKEN") {
            Ok(token) if !token.trim().is_empty() => Ok(Arc::new(SlackAdapter::new(
                &config.api_base,
                token,
                config.timeout_secs,
            )?)),
            _ => {
                tracing::warn!("actions.provider is slack but SLACK_BOT_TOKEN is not set; actions disabled");
                Ok(Arc::new(DisabledActions))
            }
        },
        other => anyhow::bail!("Unknown actions provider: {}", other),
    }
}

pub struct DisabledActions;

#[async_trait]
impl ActionAdapter for DisabledActions {
    fn is_available(&self) -> bool {
        false
    }

    async fn send(&self, _channel: &str, _text: &str) -> Result<SendReceipt, ActionError> {
        Err(ActionError::Unavailable)
    }

    async fn read(&self, _channel: &str, _limit: u32) -> Result<Vec<ChannelMessage>, ActionError> {
        Err(ActionError::Unavailable)
    }
}

/// Slack Web API adapter authenticated with a bot token.
///
/// `chat.postMessage` accepts a channel name, but `conversations.history`
/// needs the channel id, so reads resolve the name through
/// `conversations.list` first.
pub struct SlackAdapter {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct SlackEnvelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    messages: Vec<SlackMessage>,
    #[serde(default)]
    channels: Vec<SlackChannel>,
    #[serde(default)]
    response_metadata: Option<SlackCursor>,
}

#[derive(Debug, Deserialize)]
struct SlackMessage {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    ts: String,
}

#[derive(Debug, Deserialize)]
struct SlackChannel {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SlackCursor {
    #[serde(default)]
    next_cursor: String,
}

impl SlackEnvelope {
    fn into_ok(self) -> Result<Self, ActionError> {
        if self.ok {
            Ok(self)
        } else {
            Err(ActionError::Api(
                self.error.clone().unwrap_or_else(|| "unknown_error".to_string()),
            ))
        }
    }
}

/// Slack channel names carry no `#`; ids (`C…`, `G…`) pass through.
fn bare_channel(channel: &str) -> &str {
    channel.trim().trim_start_matches('#')
}

const CHANNEL_PAGES: usize = 10;

impl SlackAdapter {
    pub fn new(api_base: &str, token: String, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn call(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<SlackEnvelope, ActionError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::Http(format!("{} returned HTTP {}", method, status)));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ActionError::Http(e.to_string()))?;
        let envelope: SlackEnvelope =
            serde_json::from_str(&text).map_err(|e| ActionError::Serialization(e.to_string()))?;
        envelope.into_ok()
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn resolve_channel_id(&self, channel: &str) -> Result<String, ActionError> {
        let name = bare_channel(channel);
        let mut cursor = String::new();

        for _ in 0..CHANNEL_PAGES {
            let mut query = vec![
                ("limit", "200".to_string()),
                ("exclude_archived", "true".to_string()),
            ];
            if !cursor.is_empty() {
                query.push(("cursor", cursor.clone()));
            }
            let envelope = self
                .call(
                    "conversations.list",
                    self.client.get(self.url("conversations.list")).query(&query),
                )
                .await?;

            if let Some(found) = envelope
                .channels
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name) || c.id == name)
            {
                return Ok(found.id.clone());
            }

            cursor = envelope
                .response_metadata
                .map(|m| m.next_cursor)
                .unwrap_or_default();
            if cursor.is_empty() {
                break;
            }
        }

        Err(ActionError::UnknownChannel(format!("#{}", name)))
    }
}

#[async_trait]
impl ActionAdapter for SlackAdapter {
    fn is_available(&self) -> bool {
        true
    }

    async fn send(&self, channel: &str, text: &str) -> Result<SendReceipt, ActionError> {
        let body = serde_json::json!({
            "channel": bare_channel(channel),
            "text": text,
        });
        let envelope = self
            .call(
                "chat.postMessage",
                self.client.post(self.url("chat.postMessage")).json(&body),
            )
            .await?;

        Ok(SendReceipt {
            channel: envelope.channel.unwrap_or_else(|| channel.to_string()),
            ts: envelope.ts.unwrap_or_default(),
        })
    }

    async fn read(&self, channel: &str, limit: u32) -> Result<Vec<ChannelMessage>, ActionError> {
        let channel_id = self.resolve_channel_id(channel).await?;
        let envelope = self
            .call(
                "conversations.history",
                self.client
                    .get(self.url("conversations.history"))
                    .query(&[("channel", channel_id), ("limit", limit.to_string())]),
            )
            .await?;

        Ok(envelope
            .messages
            .into_iter()
            .take(limit as usize)
            .map(|m| ChannelMessage {
                user: m.user.or(m.username).unwrap_or_else(|| "unknown".to_string()),
                text: m.text,
                ts: m.ts,
            })
            .collect())
    }
}
