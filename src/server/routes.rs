//! API route handlers

use super::AppState;
use crate::error::ApiError;
use crate::types::request::ScoreRequest;
use crate::types::response::ScoreResponse;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Liveness probe - is the server running?
pub async fn liveness(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
        "started_at": state.started_at,
    }))
}

/// Readiness probe - can the server score transactions?
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match &state.engine {
        Some(engine) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "model_loaded": true,
                "model": engine.model_name(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "not_ready",
                "model_loaded": false,
            })),
        ),
    }
}

/// Current service metrics
pub async fn metrics(State(state): State<AppState>) -> Json<Value> {
    Json(json!(state.metrics.snapshot()))
}

/// `POST /predict`
///
/// The body is parsed as JSON whatever its declared content type.
pub async fn predict(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ScoreResponse>, ApiError> {
    let request_id = Uuid::new_v4();
    let start = Instant::now();
    state.metrics.record_request();

    // ONNX inference blocks, keep it off the async workers
    let task_state = state.clone();
    let result = tokio::task::spawn_blocking(move || score(&task_state, &body))
        .await
        .unwrap_or_else(|e| {
            Err(ApiError::Inference(anyhow::anyhow!(
                "Scoring task failed: {}",
                e
            )))
        });

    match result {
        Ok(response) => {
            let latency = start.elapsed();
            state
                .metrics
                .record_prediction(latency, response.prediction, response.probability);
            info!(
                request_id = %request_id,
                prediction = %response.prediction,
                probability = response.probability,
                latency_us = latency.as_micros() as u64,
                "Transaction scored"
            );
            Ok(Json(response))
        }
        Err(e) => {
            state.metrics.record_rejection(e.kind());
            if e.status().is_server_error() {
                error!(request_id = %request_id, error = %e, details = ?e.body().details, "Scoring failed");
            } else {
                warn!(request_id = %request_id, error = %e, "Scoring request rejected");
            }
            Err(e)
        }
    }
}

fn score(state: &AppState, body: &[u8]) -> Result<ScoreResponse, ApiError> {
    let engine = state.engine.as_ref().ok_or(ApiError::ModelNotLoaded)?;

    let request = ScoreRequest::from_slice(body)?;
    let features = state.extractor.extract(&request)?;
    debug!(features = ?features, "Features extracted");

    let classification = engine.predict(&features).map_err(ApiError::Inference)?;
    Ok(classification.into())
}
