use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use super::Notifier;

/// Posts operator alerts to a Telegram chat through the Bot API.
pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            bot_token,
            chat_id,
            client,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, message: &str) -> anyhow::Result<()> {
        // The bot token is part of the URL; errors are logged without it.
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        self.client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": message,
            }))
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .context("failed to send Telegram message")?
            .error_for_status()
            .map_err(reqwest::Error::without_url)
            .context("Telegram API returned error")?;

        Ok(())
    }
}
