//! Telegram bot - classifies voice messages.

pub mod gemini;
pub mod pipeline;
pub mod telegram;
pub mod transcribe;
#[cfg(feature = "local-stt")]
pub mod whisper;

use std::sync::Arc;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

pub use pipeline::{ACK_TEXT, FAILURE_TEXT, START_TEXT, VoiceOutcome, VoicePipeline};
pub use telegram::TelegramClient;
pub use transcribe::{STT_MARKER, Transcriber, TranscriptionError};

const DEFAULT_VOICE_MIME: &str = "audio/ogg";

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
}

pub struct BotState {
    pub telegram: TelegramClient,
    pub pipeline: VoicePipeline,
    pub ack_delay: Duration,
}

/// Poll Telegram until Ctrl-C.
pub async fn run(bot: Bot, state: Arc<BotState>) {
    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(dptree::filter(|msg: Message| msg.voice().is_some()).endpoint(handle_voice));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        // Every update is its own task, even within one chat
        .distribution_function(|_| None::<std::convert::Infallible>)
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn handle_command(msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    match cmd {
        Command::Start => {
            info!("👋 /start in chat {}", msg.chat.id);
            state.telegram.send_text(msg.chat.id, START_TEXT).await.ok();
        }
    }
    Ok(())
}

async fn handle_voice(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(voice) = msg.voice() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    info!("🎤 Voice message {} in chat {}", msg.id, chat_id);

    tokio::time::sleep(state.ack_delay).await;
    state.telegram.send_text(chat_id, ACK_TEXT).await.ok();

    let mime_type = voice
        .mime_type
        .as_ref()
        .map(|m| m.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_VOICE_MIME.to_string());

    let outcome = match state.telegram.download(&voice.file.id).await {
        Ok(audio) => state.pipeline.process(&audio, &mime_type).await,
        Err(e) => {
            error!("[BOT download error] {}", e);
            VoiceOutcome::DownloadFailed(e)
        }
    };

    state.telegram.send_text(chat_id, &outcome.reply()).await.ok();
    Ok(())
}
