//! Type definitions for the scoring API

pub mod request;
pub mod response;

pub use request::ScoreRequest;
pub use response::{FraudLabel, ScoreResponse};
