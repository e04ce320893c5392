use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::classifier::{ClassifierService, TextClassifier};

pub mod handlers;

use handlers::{classify_handler, health_handler};

#[derive(Clone)]
pub struct AppState {
    pub classifier: Arc<dyn TextClassifier>,
    /// Present in production; reported by /health.
    pub service: Option<Arc<ClassifierService>>,
}

impl AppState {
    pub fn new(service: Arc<ClassifierService>) -> Self {
        Self {
            classifier: service.clone(),
            service: Some(service),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/classify", post(classify_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}
