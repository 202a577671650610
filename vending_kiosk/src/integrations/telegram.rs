use std::time::Duration;

use log::*;
use reqwest::Client;
use serde::Serialize;
use vmc_common::Secret;

use crate::errors::NotifyError;

const TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// A minimal Telegram Bot API client that can only send text messages.
#[derive(Clone)]
pub struct TelegramBot {
    token: Secret<String>,
    api_url: String,
    client: Client,
}

impl TelegramBot {
    pub fn new(token: Secret<String>) -> Result<Self, NotifyError> {
        Self::new_with_api_url(token, TELEGRAM_API_URL)
    }

    pub fn new_with_api_url(token: Secret<String>, api_url: &str) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self { token, api_url: api_url.trim_end_matches('/').to_string(), client })
    }

    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        // The url contains the token, so it must never be logged
        let url = format!("{}/bot{}/sendMessage", self.api_url, self.token.reveal());
        let response = self
            .client
            .post(url)
            .json(&SendMessage { chat_id, text })
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;
        if response.status().is_success() {
            trace!("🔔️ Message delivered to chat {chat_id}");
            Ok(())
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;
            Err(NotifyError::Rejected { status, message })
        }
    }
}
