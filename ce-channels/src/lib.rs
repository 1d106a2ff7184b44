//! Chat transport for the commercial lookup bot.
//!
//! Adapters are pure I/O: they decode platform updates into `InboundMessage`
//! and deliver `OutboundMessage` replies.

mod split;
mod telegram;
mod traits;
mod types;

pub use split::split_message;
pub use telegram::{TelegramAdapter, TelegramBotInfo, parse_webhook_update};
pub use traits::ChannelAdapter;
pub use types::{
    ChannelId, ChatId, InboundMessage, MessageFormat, MessageId, OutboundMessage, SenderId,
};
