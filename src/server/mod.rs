//! HTTP surface of the scoring service

pub mod routes;

use crate::config::AppConfig;
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Loaded classifier; `None` when the model failed to load at startup
    pub engine: Option<Arc<InferenceEngine>>,
    pub extractor: Arc<FeatureExtractor>,
    pub metrics: Arc<ServiceMetrics>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        engine: Option<InferenceEngine>,
        extractor: FeatureExtractor,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            engine: engine.map(Arc::new),
            extractor: Arc::new(extractor),
            metrics,
            started_at: Utc::now(),
        }
    }

    /// Build state from configuration with an already-loaded engine
    pub fn from_config(
        config: &AppConfig,
        engine: Option<InferenceEngine>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        let extractor = FeatureExtractor::with_options(
            config.scoring.aggregate_stats.clone(),
            config.scoring.reject_unknown_transaction_type,
        );
        Self::new(engine, extractor, metrics)
    }
}

/// Build the router with middleware
pub fn router<P: AsRef<Path>>(state: AppState, form_path: P) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(routes::liveness))
        .route("/health/live", get(routes::liveness))
        .route("/health/ready", get(routes::readiness))
        .route("/metrics", get(routes::metrics))
        // Scoring
        .route("/predict", post(routes::predict))
        .route_service("/form", ServeFile::new(form_path.as_ref()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
