use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{error, warn};

use super::AppState;
use crate::classifier::ClassifierError;
use crate::schemas::{ClassificationRequest, ClassificationResponse, ValidationError};

pub enum ApiError {
    /// Body could not be read as `{"text": string}`.
    BadRequest(JsonRejection),
    Invalid(ValidationError),
    Unavailable(ClassifierError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            Self::BadRequest(rejection) => (rejection.status(), rejection.body_text()),
            Self::Invalid(e) => (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
            Self::Unavailable(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub async fn classify_handler(
    State(state): State<AppState>,
    payload: Result<Json<ClassificationRequest>, JsonRejection>,
) -> Result<Json<ClassificationResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected /classify body: {}", rejection.body_text());
        ApiError::BadRequest(rejection)
    })?;
    let request = request.validated().map_err(ApiError::Invalid)?;

    let verdict = state
        .classifier
        .classify(&request.text)
        .await
        .map_err(|e| {
            error!("Classification unavailable: {e}");
            ApiError::Unavailable(e)
        })?;

    Ok(Json(ClassificationResponse {
        class_id: verdict.class_id(),
    }))
}

pub async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let model_loaded = state
        .service
        .as_ref()
        .map(|s| s.is_loaded())
        .unwrap_or(false);
    Json(json!({ "status": "ok", "model_loaded": model_loaded }))
}
