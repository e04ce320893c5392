use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set but cannot be used.
    Invalid { key: &'static str, value: String, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "{} is required", key),
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid value for {} ('{}'): {}", key, value, reason)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

const DEFAULT_MODEL_PATH: &str = "./models";
const DEFAULT_MAX_LENGTH: usize = 256;
const DEFAULT_API_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8000);
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_STT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_ACK_DELAY_MS: u64 = 1000;

/// Settings for the classification model.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    /// Directory holding tokenizer.json, config.json and model.safetensors.
    pub model_path: PathBuf,
    /// Token budget per input; longer inputs are truncated.
    pub max_length: usize,
}

pub struct Config {
    pub model: ModelSettings,
    pub api_addr: SocketAddr,
    /// Only the bot needs this; see [`Config::bot_token`].
    pub telegram_bot_token: Option<String>,
    /// Gemini API key. Transcription is disabled when absent.
    pub google_api_key: Option<String>,
    pub gemini_model: String,
    pub stt_timeout: Duration,
    /// Pause before acknowledging a voice message.
    pub ack_delay: Duration,
    /// Path to a whisper.cpp model (.bin) for local transcription.
    pub whisper_model_path: Option<PathBuf>,
    pub whisper_language: String,
    /// Directory for log files. Stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the process environment, reading `.env` first if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let max_length = parse_or(&get, "MAX_LENGTH", DEFAULT_MAX_LENGTH)?;
        if max_length == 0 {
            return Err(ConfigError::Validation("MAX_LENGTH must be at least 1".into()));
        }

        let api_addr = parse_or(&get, "API_ADDR", DEFAULT_API_ADDR)?;

        Ok(Self {
            model: ModelSettings {
                model_path: get("MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
                max_length,
            },
            api_addr,
            telegram_bot_token: get("TELEGRAM_BOT_TOKEN"),
            google_api_key: get("GOOGLE_API_KEY"),
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            stt_timeout: Duration::from_secs(parse_or(
                &get,
                "STT_TIMEOUT_SECS",
                DEFAULT_STT_TIMEOUT_SECS,
            )?),
            ack_delay: Duration::from_millis(parse_or(&get, "ACK_DELAY_MS", DEFAULT_ACK_DELAY_MS)?),
            whisper_model_path: get("WHISPER_MODEL_PATH").map(PathBuf::from),
            whisper_language: get("WHISPER_LANGUAGE").unwrap_or_else(|| "ru".to_string()),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    /// The bot token, or an error if it is missing or malformed.
    pub fn bot_token(&self) -> Result<&str, ConfigError> {
        let token = self
            .telegram_bot_token
            .as_deref()
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        validate_bot_token(token)?;
        Ok(token)
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

// Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
fn validate_bot_token(token: &str) -> Result<(), ConfigError> {
    let parts: Vec<&str> = token.split(':').collect();
    if parts.len() != 2 || parts[0].parse::<u64>().is_err() || parts[1].is_empty() {
        return Err(ConfigError::Validation(
            "TELEGRAM_BOT_TOKEN appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
        ));
    }
    Ok(())
}
