use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use super::types::*;
use super::AppState;
use crate::analytics::{AnalyticsEngine, AnalyticsReport};
use crate::pipeline::BatchResult;
use crate::training::{RetrainRequest, RetrainResponse, TrainingStatus};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let registry = state.pipeline.registry();
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: registry.is_loaded(),
        model_version: registry.version(),
        users_tracked: state.pipeline.fraud().baselines().user_count(),
    }))
}

// ============================================================
// SMS batches
// ============================================================

pub async fn process_sms(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SmsBatchRequest>,
) -> ApiResult<BatchResult> {
    let user_id = request.user_id.trim();
    if user_id.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "user_id is required"));
    }
    Ok(Json(state.pipeline.process_batch(user_id, request.data).await))
}

// ============================================================
// Analytics
// ============================================================

pub async fn analytics(Json(request): Json<AnalyticsRequest>) -> ApiResult<AnalyticsReport> {
    Ok(Json(AnalyticsEngine::compute(&request.transactions, request.period)))
}

// ============================================================
// Model training
// ============================================================

/// The body is optional; an empty POST is a manual retrain.
pub async fn retrain(State(state): State<Arc<AppState>>, body: Bytes) -> ApiResult<RetrainResponse> {
    let request: RetrainRequest = if body.is_empty() {
        RetrainRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, format!("Invalid retrain request: {}", e)))?
    };

    let trainer = state.pipeline.trainer().clone();
    if trainer.status().is_training {
        return Err(api_error(StatusCode::CONFLICT, "Training already in progress"));
    }
    trainer
        .retrain_blocking(request)
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
}

pub async fn ml_status(State(state): State<Arc<AppState>>) -> ApiResult<TrainingStatus> {
    Ok(Json(state.pipeline.trainer().status()))
}
