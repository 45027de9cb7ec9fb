//! API error type and its JSON rendering

use crate::feature_extractor::FeatureError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors surfaced to callers of the scoring API.
///
/// Every variant renders as `{"error": ..., "details": ...}` with the status
/// returned by [`ApiError::status`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Model not loaded. Cannot make predictions.")]
    ModelNotLoaded,

    #[error("Invalid JSON format")]
    InvalidJson { details: String },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field: {field}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unknown transaction_type: {0}")]
    UnknownTransactionType(String),

    #[error("Prediction failed")]
    Inference(#[source] anyhow::Error),
}

/// Wire format of an error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// HTTP status for this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ModelNotLoaded | ApiError::Inference(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::InvalidJson { .. }
            | ApiError::MissingField(_)
            | ApiError::InvalidField { .. }
            | ApiError::UnknownTransactionType(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used for rejection metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::ModelNotLoaded => "model_not_loaded",
            ApiError::InvalidJson { .. } => "invalid_json",
            ApiError::MissingField(_) => "missing_field",
            ApiError::InvalidField { .. } => "invalid_field",
            ApiError::UnknownTransactionType(_) => "unknown_transaction_type",
            ApiError::Inference(_) => "inference_failed",
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            ApiError::InvalidJson { details } => Some(details.clone()),
            ApiError::InvalidField { reason, .. } => Some(reason.clone()),
            ApiError::Inference(e) => Some(format!("{:#}", e)),
            _ => None,
        };

        ErrorBody {
            error: self.to_string(),
            details,
        }
    }
}

impl From<FeatureError> for ApiError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::UnknownTransactionType(value) => ApiError::UnknownTransactionType(value),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
