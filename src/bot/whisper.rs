//! Local speech-to-text using whisper-rs.
//!
//! Telegram voice notes are OGG Opus; ffmpeg turns them into 16 kHz mono PCM
//! before Whisper sees them.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::transcribe::{TranscribeFuture, Transcriber, TranscriptionError};

pub struct WhisperTranscriber {
    ctx: Arc<WhisperContext>,
    language: String,
}

impl WhisperTranscriber {
    /// Load a Whisper model from a .bin file.
    pub fn new(model_path: &Path, language: &str) -> Result<Self, TranscriptionError> {
        info!("Loading Whisper model from {:?}", model_path);

        if !model_path.exists() {
            return Err(TranscriptionError::Unavailable(format!(
                "model file not found: {:?}",
                model_path
            )));
        }

        let path = model_path
            .to_str()
            .ok_or_else(|| TranscriptionError::Unavailable("invalid model path".into()))?;
        let ctx = WhisperContext::new_with_params(path, WhisperContextParameters::default())
            .map_err(|e| TranscriptionError::Unavailable(format!("failed to load Whisper model: {e}")))?;

        info!("Whisper model loaded");
        Ok(Self {
            ctx: Arc::new(ctx),
            language: language.to_string(),
        })
    }
}

fn run_whisper(ctx: &WhisperContext, language: &str, audio: &[u8]) -> Result<String, TranscriptionError> {
    let pcm = convert_to_pcm(audio)?;

    let mut state = ctx
        .create_state()
        .map_err(|e| TranscriptionError::Upstream(format!("failed to create Whisper state: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some(language));
    params.set_translate(false);
    params.set_no_timestamps(true);
    params.set_single_segment(false);

    state
        .full(params, &pcm)
        .map_err(|e| TranscriptionError::Upstream(format!("Whisper transcription failed: {e}")))?;

    let mut text = String::new();
    for segment in state.as_iter() {
        if let Ok(s) = segment.to_str() {
            text.push_str(s);
            text.push(' ');
        }
    }
    Ok(text.trim().to_string())
}

/// Convert compressed audio to 16 kHz mono f32 samples with ffmpeg.
fn convert_to_pcm(audio: &[u8]) -> Result<Vec<f32>, TranscriptionError> {
    // ffmpeg needs seekable input for OGG
    let input = temp_input_path();
    std::fs::write(&input, audio)
        .map_err(|e| TranscriptionError::Upstream(format!("failed to write temp input: {e}")))?;

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(&input)
        .args(["-ar", "16000", "-ac", "1", "-f", "s16le", "-acodec", "pcm_s16le", "-y", "pipe:1"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output();

    let _ = std::fs::remove_file(&input);

    let output = output
        .map_err(|e| TranscriptionError::Unavailable(format!("failed to run ffmpeg: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(TranscriptionError::Upstream(format!("ffmpeg failed: {stderr}")));
    }

    let samples = pcm_s16le_to_f32(&output.stdout);
    debug!("Converted to {} f32 samples", samples.len());
    Ok(samples)
}

fn temp_input_path() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::env::temp_dir().join(format!("stt_input_{}_{}.ogg", std::process::id(), n))
}

fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]) as f32 / 32768.0)
        .collect()
}

impl Transcriber for WhisperTranscriber {
    fn transcribe<'a>(&'a self, audio: &'a [u8], _mime_type: &'a str) -> TranscribeFuture<'a> {
        let ctx = Arc::clone(&self.ctx);
        let language = self.language.clone();
        let audio = audio.to_vec();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || run_whisper(&ctx, &language, &audio))
                .await
                .map_err(|e| TranscriptionError::Upstream(format!("Whisper task failed: {e}")))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_conversion() {
        let bytes = [0x00, 0x00, 0x00, 0x40, 0x00, 0xC0, 0xFF];
        let samples = pcm_s16le_to_f32(&bytes);
        // Trailing odd byte is dropped
        assert_eq!(samples, vec![0.0, 0.5, -0.5]);
    }

    #[test]
    fn test_missing_model_is_unavailable() {
        let err = WhisperTranscriber::new(Path::new("/nonexistent/ggml.bin"), "ru")
            .err()
            .expect("load should fail");
        assert!(matches!(err, TranscriptionError::Unavailable(_)));
    }

    #[test]
    fn test_temp_paths_are_unique() {
        assert_ne!(temp_input_path(), temp_input_path());
    }
}
