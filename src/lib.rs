//! Fraud Scoring Service Library
//!
//! Derives a fixed feature vector from raw transaction attributes and scores
//! it with a pre-trained ONNX classifier behind a small HTTP API.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod server;
pub mod types;

pub use config::AppConfig;
pub use error::ApiError;
pub use feature_extractor::{FeatureExtractor, FeatureVector, TransactionType};
pub use models::inference::{Classification, Classifier, InferenceEngine};
pub use server::{router, AppState};
pub use types::{request::ScoreRequest, response::ScoreResponse};
