//! Shared types for the event pipeline.

use std::fmt;

use chrono::{DateTime, Duration, Utc};

// ── Inbound events ──────────────────────────────────────────────────

/// Where a message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// One-to-one chat with the bot.
    User,
    /// Group chat.
    Group,
    /// Multi-person chat room.
    Room,
}

impl SourceKind {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Room => "room",
        }
    }

    /// Group and room chats require the summon keyword.
    pub fn is_shared(&self) -> bool {
        matches!(self, Self::Group | Self::Room)
    }
}

/// Single-use token that permits exactly one reply to one inbound event.
///
/// Deliberately not `Clone`: building an [`OutboundReply`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct ReplyToken(String);

impl ReplyToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A text message delivered to the bot.
#[derive(Debug)]
pub struct MessageEvent {
    pub source_kind: SourceKind,
    pub text: String,
    pub reply_token: ReplyToken,
    pub timestamp: Option<DateTime<Utc>>,
}

impl MessageEvent {
    /// Time between the platform sending the event and `now`.
    pub fn age_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.timestamp.map(|sent| now - sent)
    }
}

/// A single notification from the messaging platform.
#[derive(Debug)]
pub enum InboundEvent {
    /// New text message.
    Message(MessageEvent),
    /// The bot was added to a group or room.
    Join { reply_token: ReplyToken },
    /// Anything the bot does not answer (follow, unsend, stickers, images...).
    Unsupported { kind: String },
}

impl InboundEvent {
    /// Short label for logging.
    pub fn label(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::Join { .. } => "join",
            Self::Unsupported { kind } => kind,
        }
    }
}

// ── Gate decision ───────────────────────────────────────────────────

/// Whether the pipeline should answer a message, and with which prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Stay silent. Not an error.
    Suppress,
    /// Forward this text to the generation service.
    Forward(String),
}

// ── Generation result ───────────────────────────────────────────────

/// Why the upstream service withheld its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    Safety,
    Recitation,
    Blocklist,
    ProhibitedContent,
    Spii,
    Other(String),
}

impl BlockReason {
    /// Map an upstream finish or block reason code.
    pub fn from_code(code: &str) -> Self {
        match code {
            "SAFETY" => Self::Safety,
            "RECITATION" => Self::Recitation,
            "BLOCKLIST" => Self::Blocklist,
            "PROHIBITED_CONTENT" => Self::ProhibitedContent,
            "SPII" => Self::Spii,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safety => f.write_str("SAFETY"),
            Self::Recitation => f.write_str("RECITATION"),
            Self::Blocklist => f.write_str("BLOCKLIST"),
            Self::ProhibitedContent => f.write_str("PROHIBITED_CONTENT"),
            Self::Spii => f.write_str("SPII"),
            Self::Other(code) => f.write_str(code),
        }
    }
}

/// Outcome of one generation call. Exactly one variant is ever populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    /// Non-empty reply text.
    Ok(String),
    /// Output withheld by an upstream content filter.
    Blocked(BlockReason),
    /// No usable output (e.g. the prompt itself was filtered).
    Empty,
    /// Transport, quota or decoding failure. Carries the cause for logs only.
    Failed(String),
}

impl GenerationResult {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ok(_) => "ok",
            Self::Blocked(_) => "blocked",
            Self::Empty => "empty",
            Self::Failed(_) => "failed",
        }
    }
}

// ── Outbound ────────────────────────────────────────────────────────

/// The one reply allowed for an inbound event.
#[derive(Debug)]
pub struct OutboundReply {
    pub reply_token: ReplyToken,
    pub text: String,
}

impl OutboundReply {
    pub fn new(reply_token: ReplyToken, text: impl Into<String>) -> Self {
        Self {
            reply_token,
            text: text.into(),
        }
    }
}

/// What happened to a single inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// One reply was sent.
    Replied,
    /// The gate chose not to answer.
    Suppressed,
    /// Event kind the bot does not handle.
    Ignored,
    /// The reply was built but the platform refused it. Not retried.
    DeliveryFailed(String),
}
