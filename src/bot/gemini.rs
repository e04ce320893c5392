//! Gemini API client for speech-to-text.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::transcribe::{TranscribeFuture, Transcriber, TranscriptionError};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";

const TRANSCRIBE_PROMPT: &str = "Преобразуй аудио в текст. Верни только транскрипт без пояснений.";

pub struct GeminiTranscriber {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
struct InlineData<'a> {
    #[serde(rename = "mimeType")]
    mime_type: &'a str,
    data: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiTranscriber {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, TranscriptionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
            client,
        })
    }

    /// Point the client at another host (a proxy or a test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn generate(&self, audio: &[u8], mime_type: &str) -> Result<String, TranscriptionError> {
        info!("🎙️ Transcribing {} bytes of {} with {}", audio.len(), mime_type, self.model);

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text { text: TRANSCRIBE_PROMPT },
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type,
                            data: base64::engine::general_purpose::STANDARD.encode(audio),
                        },
                    },
                ],
            }],
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranscriptionError::Upstream(format!("Ошибка Gemini: {}", e.without_url())))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TranscriptionError::Upstream(format!("Failed to read response: {e}")))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(TranscriptionError::Upstream(format!("API error {status}: {body}")));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::Upstream(format!("Failed to parse response: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(TranscriptionError::Upstream(format!("Gemini error: {}", error.message)));
        }

        let text = first_candidate_text(parsed.candidates.unwrap_or_default());
        info!("🎙️ Transcribed {} characters", text.chars().count());
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate; empty when there is none.
fn first_candidate_text(candidates: Vec<Candidate>) -> String {
    candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

impl Transcriber for GeminiTranscriber {
    fn transcribe<'a>(&'a self, audio: &'a [u8], mime_type: &'a str) -> TranscribeFuture<'a> {
        Box::pin(self.generate(audio, mime_type))
    }
}
