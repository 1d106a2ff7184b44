use crate::split::split_message;
use crate::traits::ChannelAdapter;
use crate::types::{InboundMessage, MessageFormat, OutboundMessage};
use anyhow::Result;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const TELEGRAM_CHANNEL_ID: &str = "telegram";
const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_MAX_MESSAGE_LENGTH: usize = 4000;
const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Clone)]
pub struct TelegramAdapter {
    http: reqwest::Client,
    bot_token: String,
    api_base: String,
    max_message_length: usize,
    webhook_timeout: Duration,
}

impl TelegramAdapter {
    pub fn new(bot_token: &str, send_timeout: Duration) -> Result<Self> {
        let bot_token = bot_token.trim();
        if bot_token.is_empty() {
            return Err(anyhow::anyhow!("telegram bot token is required"));
        }
        let http = reqwest::Client::builder().timeout(send_timeout).build()?;
        Ok(Self {
            http,
            bot_token: bot_token.to_string(),
            api_base: TELEGRAM_API_BASE.to_string(),
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            webhook_timeout: DEFAULT_WEBHOOK_TIMEOUT,
        })
    }

    pub fn with_max_message_length(mut self, max_message_length: usize) -> Self {
        self.max_message_length = max_message_length.max(1);
        self
    }

    pub fn with_webhook_timeout(mut self, timeout: Duration) -> Self {
        self.webhook_timeout = timeout;
        self
    }

    /// Point the adapter at a self-hosted Bot API server.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_url(&self, method: &str) -> Result<Url> {
        Ok(Url::parse(&format!(
            "{}/bot{}/{}",
            self.api_base, self.bot_token, method
        ))?)
    }

    /// Calls `getMe`; an `Ok` means the token is accepted by Telegram.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn get_me(&self) -> Result<TelegramBotInfo> {
        let url = self.api_url("getMe")?;
        let response = self
            .http
            .get(url)
            .timeout(self.webhook_timeout)
            .send()
            .await?;
        let status = response.status();
        let body: TelegramApiResponse<TelegramBotInfo> = response.json().await?;
        match (status.is_success() && body.ok, body.result) {
            (true, Some(info)) => Ok(info),
            _ => Err(anyhow::anyhow!(
                "telegram getMe rejected: status={status} description={}",
                body.description.unwrap_or_default()
            )),
        }
    }

    pub async fn validate_token(&self) -> bool {
        match self.get_me().await {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(%error, "telegram token validation failed");
                false
            }
        }
    }

    /// Replace whatever webhook is registered with `webhook_url`.
    #[tracing::instrument(level = "info", skip(self))]
    pub async fn set_webhook(&self, webhook_url: &str) -> Result<()> {
        let delete_url = self.api_url("deleteWebhook")?;
        if let Err(error) = self
            .http
            .post(delete_url)
            .timeout(self.webhook_timeout)
            .send()
            .await
        {
            tracing::warn!(%error, "telegram deleteWebhook failed; continuing with setWebhook");
        }

        let set_url = self.api_url("setWebhook")?;
        let response = self
            .http
            .post(set_url)
            .timeout(self.webhook_timeout)
            .json(&serde_json::json!({ "url": webhook_url }))
            .send()
            .await?;
        let status = response.status();
        let body: TelegramApiResponse<serde_json::Value> = response.json().await?;
        if !status.is_success() || !body.ok {
            return Err(anyhow::anyhow!(
                "telegram setWebhook failed: status={status} description={}",
                body.description.unwrap_or_default()
            ));
        }
        tracing::info!(webhook_url, "telegram webhook configured");
        Ok(())
    }

    async fn send_chunk(&self, recipient_id: &str, text: &str, format: MessageFormat) -> Result<()> {
        let url = self.api_url("sendMessage")?;
        let mut body = serde_json::json!({
            "chat_id": recipient_id,
            "text": text,
        });
        if let Some(parse_mode) = parse_mode(format) {
            body["parse_mode"] = serde_json::Value::String(parse_mode.to_string());
        }
        let resp = self.http.post(url).json(&body).send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(anyhow::anyhow!(
                "telegram send failed: status={status} body={text}"
            ));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChannelAdapter for TelegramAdapter {
    fn channel_id(&self) -> &str {
        TELEGRAM_CHANNEL_ID
    }

    #[tracing::instrument(level = "info", skip(self, message), fields(chars = message.content.len()))]
    async fn send(&self, recipient_id: &str, message: OutboundMessage) -> Result<()> {
        let chunks = split_message(&message.content, self.max_message_length);
        let chunk_count = chunks.len();
        let mut first_error = None;
        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(error) = self.send_chunk(recipient_id, chunk, message.format).await {
                tracing::error!(%error, chunk = index + 1, chunk_count, "telegram chunk send failed");
                first_error.get_or_insert(error);
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn parse_mode(format: MessageFormat) -> Option<&'static str> {
    match format {
        MessageFormat::Plain => None,
        MessageFormat::Markdown => Some("Markdown"),
    }
}

/// Decode a webhook body. Updates that carry no usable text message yield
/// `Ok(None)`.
pub fn parse_webhook_update(body: &[u8]) -> Result<Option<InboundMessage>> {
    let update: TelegramUpdate = serde_json::from_slice(body)?;
    Ok(build_message_inbound(&update))
}

fn build_message_inbound(update: &TelegramUpdate) -> Option<InboundMessage> {
    let message = update.message.as_ref()?;
    let chat = message.chat.as_ref()?;
    let content = message
        .text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())?
        .to_string();
    let sender_id = message
        .from
        .as_ref()
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| format!("chat:{}", chat.id));
    let message_id = message
        .message_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| format!("update:{}:message", update.update_id));

    Some(InboundMessage {
        message_id: message_id.into(),
        channel_id: TELEGRAM_CHANNEL_ID.into(),
        sender_id: sender_id.into(),
        chat_id: chat.id.to_string().into(),
        content,
        metadata: serde_json::to_value(message).unwrap_or(serde_json::Value::Null),
        received_at: Utc::now(),
    })
}

#[derive(Debug, Deserialize)]
struct TelegramApiResponse<T> {
    #[serde(default)]
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
pub struct TelegramBotInfo {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct TelegramMessage {
    #[serde(default)]
    message_id: Option<i64>,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    chat: Option<TelegramChat>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct TelegramUser {
    id: i64,
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct TelegramChat {
    id: i64,
}

#[cfg(test)]
mod tests {
    use super::{TelegramAdapter, parse_webhook_update};
    use std::time::Duration;

    #[test]
    fn text_message_becomes_inbound() {
        let body = serde_json::json!({
            "update_id": 10,
            "message": {
                "message_id": 77,
                "from": { "id": 555 },
                "chat": { "id": 999, "type": "private" },
                "text": "  cliente  "
            }
        });
        let inbound = parse_webhook_update(body.to_string().as_bytes())
            .expect("parse update")
            .expect("inbound message");
        assert_eq!(inbound.content, "cliente");
        assert_eq!(inbound.sender_id.as_str(), "555");
        assert_eq!(inbound.chat_id.as_str(), "999");
        assert_eq!(inbound.message_id.as_str(), "77");
        assert_eq!(inbound.channel_id.as_str(), "telegram");
    }

    #[test]
    fn updates_without_text_are_ignored() {
        let no_message = serde_json::json!({ "update_id": 1, "edited_message": {} });
        assert!(
            parse_webhook_update(no_message.to_string().as_bytes())
                .expect("parse")
                .is_none()
        );

        let photo_only = serde_json::json!({
            "update_id": 2,
            "message": { "message_id": 3, "chat": { "id": 4, "type": "private" }, "photo": [] }
        });
        assert!(
            parse_webhook_update(photo_only.to_string().as_bytes())
                .expect("parse")
                .is_none()
        );

        let blank = serde_json::json!({
            "update_id": 3,
            "message": { "chat": { "id": 4 }, "text": "   " }
        });
        assert!(
            parse_webhook_update(blank.to_string().as_bytes())
                .expect("parse")
                .is_none()
        );
    }

    #[test]
    fn missing_sender_falls_back_to_chat_scope() {
        let body = serde_json::json!({
            "update_id": 42,
            "message": { "chat": { "id": -100, "type": "group" }, "text": "help" }
        });
        let inbound = parse_webhook_update(body.to_string().as_bytes())
            .expect("parse")
            .expect("inbound");
        assert_eq!(inbound.sender_id.as_str(), "chat:-100");
        assert_eq!(inbound.message_id.as_str(), "update:42:message");
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(parse_webhook_update(b"not json").is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(TelegramAdapter::new("  ", Duration::from_secs(8)).is_err());
    }
}
