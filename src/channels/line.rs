//! LINE Messaging API: webhook payload parsing and the reply endpoint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::channels::ReplySender;
use crate::error::ChannelError;
use crate::pipeline::types::{InboundEvent, MessageEvent, OutboundReply, ReplyToken, SourceKind};

/// Public Messaging API endpoint.
pub const LINE_API_BASE: &str = "https://api.line.me";

/// Maximum characters in one text message.
const LINE_MAX_MESSAGE_LENGTH: usize = 5000;

/// Maximum messages a single reply token may carry.
const LINE_MAX_MESSAGES_PER_REPLY: usize = 5;

const CHANNEL: &str = "line";

// ── Webhook payload ─────────────────────────────────────────────────

/// Body of a webhook delivery. `events` is empty for console verification pings.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<WireEvent>,
}

/// One event as sent on the wire. Fields vary by `type`, so all are optional.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<WireSource>,
    #[serde(default)]
    pub message: Option<WireMessage>,
    /// Milliseconds since the epoch.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Only the chat kind matters; user, group and room ids are ignored.
#[derive(Debug, Deserialize)]
pub struct WireSource {
    #[serde(rename = "type")]
    pub kind: String,
}

impl WireSource {
    fn source_kind(&self) -> Option<SourceKind> {
        match self.kind.as_str() {
            "user" => Some(SourceKind::User),
            "group" => Some(SourceKind::Group),
            "room" => Some(SourceKind::Room),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl WireEvent {
    /// Convert into the pipeline's event type. Anything unanswerable becomes `Unsupported`.
    pub fn into_inbound(self) -> InboundEvent {
        let Self {
            kind,
            reply_token,
            source,
            message,
            timestamp,
        } = self;

        // Standby-mode and some event kinds carry no reply token.
        let Some(reply_token) = reply_token else {
            return InboundEvent::Unsupported { kind };
        };

        match kind.as_str() {
            "join" => InboundEvent::Join {
                reply_token: ReplyToken::new(reply_token),
            },
            "message" => {
                let Some(source_kind) = source.as_ref().and_then(WireSource::source_kind) else {
                    return InboundEvent::Unsupported { kind };
                };
                match message {
                    Some(WireMessage {
                        kind: message_kind,
                        text,
                    }) if message_kind == "text" => InboundEvent::Message(MessageEvent {
                        source_kind,
                        text: text.unwrap_or_default(),
                        reply_token: ReplyToken::new(reply_token),
                        timestamp: timestamp.and_then(DateTime::<Utc>::from_timestamp_millis),
                    }),
                    Some(other) => InboundEvent::Unsupported {
                        kind: format!("message/{}", other.kind),
                    },
                    None => InboundEvent::Unsupported { kind },
                }
            }
            _ => InboundEvent::Unsupported { kind },
        }
    }
}

/// Parse a verified webhook body into events, in payload order.
pub fn parse_events(body: &[u8]) -> Result<Vec<InboundEvent>, ChannelError> {
    let payload: WebhookPayload = serde_json::from_slice(body)
        .map_err(|e| ChannelError::InvalidMessage(format!("webhook body: {e}")))?;
    debug!(
        destination = payload.destination.as_deref().unwrap_or("unknown"),
        events = payload.events.len(),
        "Parsed webhook payload"
    );
    Ok(payload
        .events
        .into_iter()
        .map(WireEvent::into_inbound)
        .collect())
}

// ── Reply client ────────────────────────────────────────────────────

/// Sends replies through `POST /v2/bot/message/reply`.
pub struct LineReplyClient {
    access_token: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl LineReplyClient {
    pub fn new(access_token: SecretString) -> Self {
        Self {
            access_token,
            base_url: LINE_API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at another host (proxies, local fakes).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v2/bot/{path}", self.base_url)
    }
}

/// Build the reply body, splitting long text across several messages.
fn reply_body(reply: &OutboundReply) -> serde_json::Value {
    let mut chunks = split_message(&reply.text, LINE_MAX_MESSAGE_LENGTH);
    if chunks.len() > LINE_MAX_MESSAGES_PER_REPLY {
        warn!(
            chunks = chunks.len(),
            "Reply too long for one reply token; truncating"
        );
        chunks.truncate(LINE_MAX_MESSAGES_PER_REPLY);
    }
    let messages: Vec<serde_json::Value> = chunks
        .into_iter()
        .map(|text| serde_json::json!({ "type": "text", "text": text }))
        .collect();
    serde_json::json!({
        "replyToken": reply.reply_token.as_str(),
        "messages": messages,
    })
}

#[async_trait]
impl ReplySender for LineReplyClient {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send_reply(&self, reply: OutboundReply) -> Result<(), ChannelError> {
        let body = reply_body(&reply);

        let resp = self
            .client
            .post(self.api_url("message/reply"))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: CHANNEL.into(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: CHANNEL.into(),
                reason: format!("reply failed: {status} {err}"),
            });
        }

        info!(chars = reply.text.chars().count(), "LINE reply sent");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Split text into chunks of at most `max_chars` characters.
/// Tries to split on newlines, then spaces, then hard-cuts on a char boundary.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        let Some((cut, _)) = remaining.char_indices().nth(max_chars) else {
            chunks.push(remaining.to_string());
            break;
        };

        let window = &remaining[..cut];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(cut);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
