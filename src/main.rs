use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{error, info, warn};

use toxiguard::bot::{self, BotState, TelegramClient, VoicePipeline};
use toxiguard::classifier::ClassifierService;
use toxiguard::config::Config;
use toxiguard::logging;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let _guard = logging::init(config.log_dir.as_deref(), "bot");

    let token = match config.bot_token() {
        Ok(token) => token.to_string(),
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    info!("🚀 Starting voice classification bot...");
    info!("Model path: {}", config.model.model_path.display());

    let classifier = Arc::new(ClassifierService::new(config.model.clone()));
    // A failed warm-up is retried lazily on the first voice message
    if let Err(e) = classifier.warm_up().await {
        warn!("Model not loaded at startup: {e}");
    }

    let bot = Bot::new(token);
    let state = Arc::new(BotState {
        telegram: TelegramClient::new(bot.clone()),
        pipeline: VoicePipeline::new(bot::transcribe::from_config(&config), classifier),
        ack_delay: config.ack_delay,
    });

    bot::run(bot, state).await;
    info!("Bot stopped");
}
