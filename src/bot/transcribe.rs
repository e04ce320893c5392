//! Speech-to-text port and backend selection.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;

use super::gemini::GeminiTranscriber;

/// Prefix carried by every transcription failure message.
pub const STT_MARKER: &str = "[STT]";

pub type TranscribeFuture<'a> = Pin<Box<dyn Future<Output = Result<String, TranscriptionError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionError {
    /// No API key configured.
    MissingCredential,
    /// The backend cannot run here (missing model, tool or feature).
    Unavailable(String),
    /// The backend ran and failed.
    Upstream(String),
}

impl fmt::Display for TranscriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCredential => write!(f, "{STT_MARKER} GOOGLE_API_KEY is not set"),
            Self::Unavailable(e) => write!(f, "{STT_MARKER} transcription unavailable: {e}"),
            Self::Upstream(e) => write!(f, "{STT_MARKER} transcription failed: {e}"),
        }
    }
}

impl std::error::Error for TranscriptionError {}

pub trait Transcriber: Send + Sync {
    /// Turn audio bytes into text. An empty string means nothing was heard.
    fn transcribe<'a>(&'a self, audio: &'a [u8], mime_type: &'a str) -> TranscribeFuture<'a>;
}

/// Stand-in used when no backend is configured.
pub struct DisabledTranscriber;

impl Transcriber for DisabledTranscriber {
    fn transcribe<'a>(&'a self, _audio: &'a [u8], _mime_type: &'a str) -> TranscribeFuture<'a> {
        Box::pin(async { Err(TranscriptionError::MissingCredential) })
    }
}

/// Pick a backend: local Whisper when built in and configured, then Gemini,
/// else a disabled stand-in.
pub fn from_config(config: &Config) -> Arc<dyn Transcriber> {
    if let Some(local) = local_backend(config) {
        return local;
    }

    match config.google_api_key {
        Some(ref key) => {
            match GeminiTranscriber::new(key.clone(), config.gemini_model.clone(), config.stt_timeout) {
                Ok(gemini) => {
                    info!("Using Gemini transcription ({})", config.gemini_model);
                    Arc::new(gemini)
                }
                Err(e) => {
                    warn!("Gemini client unavailable, voice messages will fail: {e}");
                    Arc::new(DisabledTranscriber)
                }
            }
        }
        None => {
            warn!("GOOGLE_API_KEY not set, voice messages will fail");
            Arc::new(DisabledTranscriber)
        }
    }
}

#[cfg(feature = "local-stt")]
fn local_backend(config: &Config) -> Option<Arc<dyn Transcriber>> {
    let path = config.whisper_model_path.as_ref()?;
    match super::whisper::WhisperTranscriber::new(path, &config.whisper_language) {
        Ok(whisper) => {
            info!("Using local Whisper transcription");
            Some(Arc::new(whisper))
        }
        Err(e) => {
            warn!("Whisper unavailable, falling back: {e}");
            None
        }
    }
}

#[cfg(not(feature = "local-stt"))]
fn local_backend(config: &Config) -> Option<Arc<dyn Transcriber>> {
    if config.whisper_model_path.is_some() {
        warn!("WHISPER_MODEL_PATH is set but this build lacks the local-stt feature");
    }
    None
}
