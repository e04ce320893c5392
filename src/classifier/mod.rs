//! Classifier service: owns the model and turns texts into verdicts.

pub mod labels;
pub mod model;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::ModelSettings;

pub use labels::{ToxicityClass, map_class_id_to_text};
pub use model::{Prediction, ToxicityModel};

pub type ClassifierFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A loaded model that maps one text to a prediction. Blocking.
pub trait Predictor: Send + Sync {
    fn predict(&self, text: &str) -> anyhow::Result<Prediction>;
}

impl Predictor for ToxicityModel {
    fn predict(&self, text: &str) -> anyhow::Result<Prediction> {
        ToxicityModel::predict(self, text)
    }
}

/// Builds a predictor from settings. Runs on a blocking thread.
pub type ModelLoader =
    Arc<dyn Fn(&ModelSettings) -> anyhow::Result<Arc<dyn Predictor>> + Send + Sync>;

#[derive(Debug, Clone)]
pub enum ClassifierError {
    /// The model could not be loaded; retried on the next call.
    Load(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load(e) => write!(f, "model unavailable: {e}"),
        }
    }
}

impl std::error::Error for ClassifierError {}

/// Outcome of classifying one text.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Classified { class_id: u32, confidence: f32 },
    /// Inference failed; treated as neutral.
    Degraded { reason: String },
}

impl Verdict {
    pub fn class_id(&self) -> u32 {
        match self {
            Self::Classified { class_id, .. } => *class_id,
            Self::Degraded { .. } => ToxicityClass::Neutral.class_id(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Anything that can classify text. The HTTP API and the bot depend on this
/// rather than on the model directly.
pub trait TextClassifier: Send + Sync {
    fn classify<'a>(&'a self, text: &'a str) -> ClassifierFuture<'a, Result<Verdict, ClassifierError>>;
}

pub struct ClassifierService {
    settings: ModelSettings,
    loader: ModelLoader,
    model: OnceCell<Arc<dyn Predictor>>,
}

impl ClassifierService {
    /// Service backed by [`ToxicityModel`] from `settings.model_path`.
    pub fn new(settings: ModelSettings) -> Self {
        Self::with_loader(
            settings,
            Arc::new(|settings: &ModelSettings| -> anyhow::Result<Arc<dyn Predictor>> {
                let model = ToxicityModel::load(&settings.model_path, settings.max_length)?;
                Ok(Arc::new(model) as Arc<dyn Predictor>)
            }),
        )
    }

    pub fn with_loader(settings: ModelSettings, loader: ModelLoader) -> Self {
        Self {
            settings,
            loader,
            model: OnceCell::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.initialized()
    }

    /// Load the model now instead of on first use.
    pub async fn warm_up(&self) -> Result<(), ClassifierError> {
        self.model().await.map(|_| ())
    }

    /// The loaded model. Concurrent first callers share a single load; a
    /// failed load leaves the cell empty.
    async fn model(&self) -> Result<Arc<dyn Predictor>, ClassifierError> {
        self.model
            .get_or_try_init(|| async {
                let settings = self.settings.clone();
                let loader = Arc::clone(&self.loader);
                let loaded = tokio::task::spawn_blocking(move || loader(&settings))
                    .await
                    .map_err(|e| ClassifierError::Load(format!("loader task failed: {e}")))?;

                match loaded {
                    Ok(model) => Ok(model),
                    Err(e) => {
                        error!("Model load failed: {e:#}");
                        Err(ClassifierError::Load(format!("{e:#}")))
                    }
                }
            })
            .await
            .cloned()
    }
}

impl TextClassifier for ClassifierService {
    fn classify<'a>(&'a self, text: &'a str) -> ClassifierFuture<'a, Result<Verdict, ClassifierError>> {
        Box::pin(async move {
            let model = self.model().await?;
            info!("[classifier input] {}", truncate(text, 100));

            let owned = text.to_string();
            let result = tokio::task::spawn_blocking(move || model.predict(&owned))
                .await
                .unwrap_or_else(|e| Err(anyhow::anyhow!("inference task failed: {e}")));

            let verdict = settle(result);
            match &verdict {
                Verdict::Classified { class_id, confidence } => {
                    info!("[classifier output] class_id: {class_id} ({confidence:.3})");
                }
                Verdict::Degraded { reason } => {
                    warn!("[classifier output] degraded to neutral: {reason}");
                }
            }
            Ok(verdict)
        })
    }
}

/// Fold an inference result into a verdict; errors become a neutral fallback.
fn settle(result: anyhow::Result<Prediction>) -> Verdict {
    match result {
        Ok(prediction) => Verdict::Classified {
            class_id: prediction.class_index as u32,
            confidence: prediction.confidence,
        },
        Err(e) => {
            error!("Classification error: {e:#}");
            Verdict::Degraded {
                reason: format!("{e:#}"),
            }
        }
    }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max).collect();
        format!("{head}...")
    }
}
