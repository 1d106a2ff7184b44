use crate::types::OutboundMessage;
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Unique channel identifier, e.g. "telegram".
    fn channel_id(&self) -> &str;

    /// Send a message to a chat on this platform. Adapters split content that
    /// exceeds the platform limit and deliver the parts in order.
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()>;
}
