//! Outbound seam to the messaging platform.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::pipeline::types::OutboundReply;

/// Sends the single reply an inbound event is allowed.
///
/// The reply (and its token) is consumed, so the same token cannot be used
/// twice. Failures are reported once; callers do not retry.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Channel name for logs.
    fn name(&self) -> &str;

    async fn send_reply(&self, reply: OutboundReply) -> Result<(), ChannelError>;
}
