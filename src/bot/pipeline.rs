//! Voice message pipeline: transcript → validation → classification.
//!
//! Telegram I/O stays in the handlers; this part only sees audio bytes and
//! returns what happened, so it can be exercised with fake backends.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::classifier::{ClassifierError, TextClassifier, ToxicityClass, map_class_id_to_text, truncate};
use crate::schemas::{ClassificationRequest, ValidationError};

use super::transcribe::{STT_MARKER, Transcriber, TranscriptionError};

pub const START_TEXT: &str = "Здравствуйте! Наша интеллектуальная система позволит Вам классифицировать голосовой контент на 3 группы: 1. токсичный, 2. оскорбительный, 3. нейтральный. Оставьте свое голосовое сообщение и дождитесь решения";
pub const ACK_TEXT: &str = "Получили сообщение, ожидайте";
pub const FAILURE_TEXT: &str = "Произошла ошибка. Попробуйте отправить аудио еще раз";

/// Where a voice message ended up.
#[derive(Debug)]
pub enum VoiceOutcome {
    Classified { class_id: u32, label: &'static str, degraded: bool },
    DownloadFailed(String),
    TranscriptionFailed(TranscriptionError),
    ValidationFailed(ValidationError),
    ClassificationFailed(ClassifierError),
}

impl VoiceOutcome {
    /// Text sent back to the user.
    pub fn reply(&self) -> String {
        match self {
            Self::Classified { label, .. } => format!(
                "Мы присвоили Вашему голосовому сообщению класс '{label}'. Всегда к вашим услугам"
            ),
            _ => FAILURE_TEXT.to_string(),
        }
    }
}

pub struct VoicePipeline {
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn TextClassifier>,
}

impl VoicePipeline {
    pub fn new(transcriber: Arc<dyn Transcriber>, classifier: Arc<dyn TextClassifier>) -> Self {
        Self { transcriber, classifier }
    }

    pub async fn process(&self, audio: &[u8], mime_type: &str) -> VoiceOutcome {
        let transcript = match self.transcriber.transcribe(audio, mime_type).await {
            Ok(text) if text.starts_with(STT_MARKER) => {
                error!("[BOT STT error] {}", text);
                return VoiceOutcome::TranscriptionFailed(TranscriptionError::Upstream(text));
            }
            Ok(text) => text,
            Err(e) => {
                error!("[BOT STT error] {}", e);
                return VoiceOutcome::TranscriptionFailed(e);
            }
        };
        info!("[BOT STT transcript] {}", truncate(&transcript, 100));

        let request = match ClassificationRequest::new(&transcript) {
            Ok(request) => request,
            Err(e) => {
                error!("[BOT validation error] {}", e);
                return VoiceOutcome::ValidationFailed(e);
            }
        };

        match self.classifier.classify(&request.text).await {
            Ok(verdict) => {
                let class_id = verdict.class_id();
                if ToxicityClass::from_class_id(class_id).is_none() {
                    warn!("[BOT agent] unexpected class_id {class_id}, reading it as neutral");
                }
                let label = map_class_id_to_text(class_id as i64);
                info!("[BOT agent result] class_id: {class_id}, class_name: {label}");
                VoiceOutcome::Classified {
                    class_id,
                    label,
                    degraded: verdict.is_degraded(),
                }
            }
            Err(e) => {
                error!("[BOT classification error] {}", e);
                VoiceOutcome::ClassificationFailed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::transcribe::TranscribeFuture;
    use crate::classifier::{ClassifierFuture, Verdict};
    use std::sync::Mutex;

    struct FakeTranscriber(Result<String, TranscriptionError>);

    impl Transcriber for FakeTranscriber {
        fn transcribe<'a>(&'a self, _audio: &'a [u8], _mime_type: &'a str) -> TranscribeFuture<'a> {
            let result = self.0.clone();
            Box::pin(async move { result })
        }
    }

    /// Records every text it is asked to classify.
    struct FakeClassifier {
        result: Result<Verdict, ClassifierError>,
        seen: Mutex<Vec<String>>,
    }

    impl FakeClassifier {
        fn new(result: Result<Verdict, ClassifierError>) -> Arc<Self> {
            Arc::new(Self { result, seen: Mutex::new(Vec::new()) })
        }

        fn calls(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl TextClassifier for FakeClassifier {
        fn classify<'a>(&'a self, text: &'a str) -> ClassifierFuture<'a, Result<Verdict, ClassifierError>> {
            self.seen.lock().unwrap().push(text.to_string());
            let result = self.result.clone();
            Box::pin(async move { result })
        }
    }

    fn classified(class_id: u32) -> Result<Verdict, ClassifierError> {
        Ok(Verdict::Classified { class_id, confidence: 0.9 })
    }

    fn pipeline(transcript: Result<String, TranscriptionError>, classifier: &Arc<FakeClassifier>) -> VoicePipeline {
        VoicePipeline::new(Arc::new(FakeTranscriber(transcript)), classifier.clone())
    }

    #[tokio::test]
    async fn test_toxic_voice_message() {
        let classifier = FakeClassifier::new(classified(1));
        let outcome = pipeline(Ok("привет".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(matches!(
            outcome,
            VoiceOutcome::Classified { class_id: 1, label: "токсичный", degraded: false }
        ));
        assert!(outcome.reply().contains("'токсичный'"));
        assert_eq!(classifier.calls(), vec!["привет"]);
    }

    #[tokio::test]
    async fn test_marker_transcript_skips_classifier() {
        let classifier = FakeClassifier::new(classified(1));
        let outcome = pipeline(Ok("[STT] Ошибка Gemini: timeout".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(matches!(outcome, VoiceOutcome::TranscriptionFailed(_)));
        assert_eq!(outcome.reply(), FAILURE_TEXT);
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transcription_error_skips_classifier() {
        let classifier = FakeClassifier::new(classified(2));
        let outcome = pipeline(Err(TranscriptionError::MissingCredential), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(matches!(
            outcome,
            VoiceOutcome::TranscriptionFailed(TranscriptionError::MissingCredential)
        ));
        assert_eq!(outcome.reply(), FAILURE_TEXT);
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_transcript_fails_validation() {
        let classifier = FakeClassifier::new(classified(0));
        let outcome = pipeline(Ok("   ".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(matches!(outcome, VoiceOutcome::ValidationFailed(ValidationError::Empty)));
        assert_eq!(outcome.reply(), FAILURE_TEXT);
        assert!(classifier.calls().is_empty());
    }

    #[tokio::test]
    async fn test_transcript_is_trimmed_before_classification() {
        let classifier = FakeClassifier::new(classified(2));
        let outcome = pipeline(Ok("  иди отсюда \n".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(outcome.reply().contains("'оскорбительный'"));
        assert_eq!(classifier.calls(), vec!["иди отсюда"]);
    }

    #[tokio::test]
    async fn test_degraded_verdict_replies_neutral() {
        let classifier = FakeClassifier::new(Ok(Verdict::Degraded { reason: "oom".into() }));
        let outcome = pipeline(Ok("привет".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(matches!(
            outcome,
            VoiceOutcome::Classified { class_id: 0, label: "нейтральный", degraded: true }
        ));
        assert!(outcome.reply().contains("'нейтральный'"));
    }

    #[tokio::test]
    async fn test_unknown_class_reads_as_neutral() {
        let classifier = FakeClassifier::new(classified(7));
        let outcome = pipeline(Ok("привет".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(outcome.reply().contains("'нейтральный'"));
    }

    #[tokio::test]
    async fn test_model_load_failure_is_generic_failure() {
        let classifier = FakeClassifier::new(Err(ClassifierError::Load("no weights".into())));
        let outcome = pipeline(Ok("привет".into()), &classifier)
            .process(b"OggS", "audio/ogg")
            .await;

        assert!(matches!(outcome, VoiceOutcome::ClassificationFailed(_)));
        assert_eq!(outcome.reply(), FAILURE_TEXT);
    }

    #[test]
    fn test_reply_template() {
        let outcome = VoiceOutcome::Classified { class_id: 0, label: "нейтральный", degraded: false };
        assert_eq!(
            outcome.reply(),
            "Мы присвоили Вашему голосовому сообщению класс 'нейтральный'. Всегда к вашим услугам"
        );
        assert_eq!(VoiceOutcome::DownloadFailed("gone".into()).reply(), FAILURE_TEXT);
    }
}
