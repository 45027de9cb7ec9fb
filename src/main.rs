//! Fraud Scoring Service - Main Entry Point
//!
//! Loads the classifier once, then serves `POST /predict` and the HTML form.

use anyhow::{Context, Result};
use fraud_scoring_service::{
    config::{AppConfig, LogFormat, LoggingConfig},
    metrics::{MetricsReporter, ServiceMetrics},
    models::inference::InferenceEngine,
    server::{self, AppState},
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (optional - won't fail if missing)
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Fraud Scoring Service v{}", env!("CARGO_PKG_VERSION"));

    let metrics = Arc::new(ServiceMetrics::new());

    // A missing model is not fatal: the server still starts and every
    // prediction answers 500 until it is restarted with a model in place
    let engine = match InferenceEngine::load(&config.model) {
        Ok(engine) => {
            info!(model = %engine.model_name(), path = %config.model.path, "Model loaded");
            Some(engine)
        }
        Err(e) => {
            error!(
                path = %config.model.path,
                error = %format!("{:#}", e),
                "Model not loaded, predictions will fail"
            );
            None
        }
    };

    let state = AppState::from_config(&config, engine, metrics.clone());
    info!(
        features = state.extractor.feature_count(),
        reject_unknown_transaction_type = config.scoring.reject_unknown_transaction_type,
        "Feature extractor initialized"
    );

    if config.metrics.report_interval_secs > 0 {
        let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
        tokio::spawn(reporter.start());
    }

    let app = server::router(state, &config.server.form_path);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(addr = %addr, form = %config.server.form_path, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}

/// RUST_LOG wins over the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(format!(
            "fraud_scoring_service={level},tower_http={level}",
            level = logging.level
        ))
    })?;

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
