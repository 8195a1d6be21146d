use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::config::MirrorConfig;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Sends finished archives to a Telegram chat through the Bot API.
pub struct TelegramDelivery {
    client: Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramDelivery {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    pub fn from_config(config: &MirrorConfig) -> Result<Self> {
        let bot_token = config
            .telegram_bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty());
        let chat_id = config
            .telegram_chat_id
            .as_deref()
            .filter(|c| !c.trim().is_empty());

        match (bot_token, chat_id) {
            (Some(token), Some(chat)) => Self::new(&config.telegram_api_base, token, chat),
            _ => bail!("Telegram delivery needs telegram_bot_token and telegram_chat_id in the config file"),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendDocument", self.api_base, self.bot_token)
    }

    pub async fn send_document(&self, file_path: &Path) -> Result<()> {
        tracing::info!("Sending {:?} to Telegram chat {}", file_path, self.chat_id);

        let content = tokio::fs::read(file_path)
            .await
            .with_context(|| format!("Failed to read {:?}", file_path))?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "mirror.zip".to_string());

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .part("document", Part::bytes(content).file_name(file_name));

        let response = self
            .client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await
            .context("Failed to send document to Telegram")?;

        let status = response.status();
        if !status.is_success() {
            bail!("Telegram API returned HTTP {}", status);
        }

        let body: TelegramResponse = response
            .json()
            .await
            .context("Failed to parse Telegram API response")?;
        if !body.ok {
            bail!(
                "Telegram API rejected the document: {}",
                body.description.unwrap_or_else(|| "no description".to_string())
            );
        }

        tracing::info!("Document delivered");
        Ok(())
    }
}
