//! Configuration management for the fraud scoring service

use crate::feature_extractor::AggregateStats;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Environment variable that overrides the configuration file path
pub const CONFIG_PATH_ENV: &str = "FRAUD_SCORING_CONFIG";

/// Prefix for environment overrides, e.g. `FRAUD_SCORING__SERVER__PORT=8080`
const ENV_PREFIX: &str = "FRAUD_SCORING";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub scoring: ScoringConfig,
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Bind port
    pub port: u16,
    /// Static HTML form served at `GET /form`
    pub form_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            form_path: "static/index.html".to_string(),
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Classifier artifact configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the exported ONNX classifier
    pub path: String,
    /// Name used in logs and metrics
    pub name: String,
    /// Number of intra-op threads for ONNX inference
    pub onnx_threads: usize,
    /// Probability above which a transaction is labelled fraud when the
    /// model does not emit its own label
    pub decision_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "models/xgb_fraud_model.onnx".to_string(),
            name: "xgboost".to_string(),
            onnx_threads: 1,
            decision_threshold: 0.5,
        }
    }
}

/// Feature transform configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScoringConfig {
    /// Reject requests whose `transaction_type` is not one of the known
    /// types instead of zeroing every one-hot column
    pub reject_unknown_transaction_type: bool,
    /// Aggregate statistics fed to the model alongside each transaction
    pub aggregate_stats: AggregateStats,
}

/// Metrics reporting configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between logged summaries (0 disables the reporter)
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 60,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default file (or the one named by
    /// `FRAUD_SCORING_CONFIG`) plus environment overrides.
    ///
    /// A missing file is not an error; defaults apply.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::build(Some(path.as_str()), false)
    }

    /// Load configuration from a specific path, which must exist.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self::build(Some(path.as_str()), true)
    }

    fn build(path: Option<&str>, required: bool) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(required));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
