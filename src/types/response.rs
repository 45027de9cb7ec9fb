//! Scoring response data structures

use serde::{Deserialize, Serialize};

/// Binary fraud label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FraudLabel {
    #[serde(rename = "Fraud")]
    Fraud,
    #[serde(rename = "Not Fraud")]
    NotFraud,
}

impl FraudLabel {
    /// Map a model class id (1 = fraud) to a label
    pub fn from_class(class: i64) -> Self {
        if class == 1 {
            FraudLabel::Fraud
        } else {
            FraudLabel::NotFraud
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FraudLabel::Fraud => "Fraud",
            FraudLabel::NotFraud => "Not Fraud",
        }
    }
}

impl std::fmt::Display for FraudLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResponse {
    /// Fraud / Not Fraud
    pub prediction: FraudLabel,
    /// Probability of the fraud class
    pub probability: f64,
}
