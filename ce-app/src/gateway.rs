//! Inbound chat messages → conversation engine → one outbound reply.

use crate::engine::ConversationEngine;
use anyhow::Result;
use ce_channels::{ChannelAdapter, InboundMessage};
use std::sync::Arc;

#[derive(Clone)]
pub struct Gateway {
    engine: Arc<ConversationEngine>,
    channel: Arc<dyn ChannelAdapter>,
}

impl Gateway {
    pub fn new(engine: Arc<ConversationEngine>, channel: Arc<dyn ChannelAdapter>) -> Self {
        Self { engine, channel }
    }

    pub fn engine(&self) -> &Arc<ConversationEngine> {
        &self.engine
    }

    #[tracing::instrument(
        level = "info",
        skip_all,
        fields(
            channel = %inbound.channel_id,
            chat_id = %inbound.chat_id,
            message_id = %inbound.message_id
        )
    )]
    pub async fn handle_inbound(&self, inbound: InboundMessage) -> Result<()> {
        let reply = self
            .engine
            .handle(&inbound.sender_id, &inbound.content)
            .await;
        self.channel.send(&inbound.chat_id, reply.into()).await
    }
}
