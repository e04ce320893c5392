//! Telegram client using teloxide.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::FileId;
use tracing::{info, warn};

/// Telegram API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), String> {
        self.bot
            .send_message(chat_id, text)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Download a file by file_id into memory.
    pub async fn download(&self, file_id: &FileId) -> Result<Vec<u8>, String> {
        let file = self
            .bot
            .get_file(file_id.clone())
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;

        info!("📥 Downloaded {} ({} bytes)", file.path, data.len());
        Ok(data)
    }
}
