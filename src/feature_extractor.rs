//! Feature extraction for fraud classifier inference.
//!
//! Turns a validated scoring request into the 16-column feature vector the
//! classifier was trained on. Column order is fixed by [`FEATURE_NAMES`].

use crate::types::request::ScoreRequest;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Number of features produced per transaction
pub const FEATURE_COUNT: usize = 16;

/// Column names in model input order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "log_amount",
    "deltaOrig",
    "orig_balance_ratio",
    "exact_drain_flag",
    "large_transfer_flag",
    "is_flagged",
    "hour",
    "type_CASH_IN",
    "type_CASH_OUT",
    "type_DEBIT",
    "type_PAYMENT",
    "type_TRANSFER",
    "amount_count",
    "amount_mean",
    "amount_std",
    "log_amount_mean",
];

/// Errors raised while building a feature vector
#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("Unknown transaction_type: {0}")]
    UnknownTransactionType(String),
}

/// Transaction types known to the model, in one-hot column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    CashIn,
    CashOut,
    Debit,
    Payment,
    Transfer,
}

impl TransactionType {
    pub const ALL: [TransactionType; 5] = [
        TransactionType::CashIn,
        TransactionType::CashOut,
        TransactionType::Debit,
        TransactionType::Payment,
        TransactionType::Transfer,
    ];

    /// Exact, case-sensitive match on the wire name
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::CashIn => "CASH_IN",
            TransactionType::CashOut => "CASH_OUT",
            TransactionType::Debit => "DEBIT",
            TransactionType::Payment => "PAYMENT",
            TransactionType::Transfer => "TRANSFER",
        }
    }

    /// One-hot columns for an optional type. `None` yields all zeros.
    pub fn one_hot(value: Option<Self>) -> [f32; 5] {
        let mut columns = [0.0; 5];
        if let Some(t) = value {
            columns[t as usize] = 1.0;
        }
        columns
    }
}

/// Per-account aggregates fed to the model next to each transaction.
///
/// These are not computed from account history yet; the defaults are the
/// fixed placeholder values the model was served with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregateStats {
    pub amount_count: f64,
    pub amount_mean: f64,
    pub amount_std: f64,
    /// Amount whose log becomes `log_amount_mean`
    pub reference_amount: f64,
}

impl AggregateStats {
    pub fn log_amount_mean(&self) -> f64 {
        self.reference_amount.ln_1p()
    }
}

impl Default for AggregateStats {
    fn default() -> Self {
        Self {
            amount_count: 5.0,
            amount_mean: 50_000.0,
            amount_std: 20_000.0,
            reference_amount: 40_000.0,
        }
    }
}

/// Model input for one transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[allow(non_snake_case)]
pub struct FeatureVector {
    pub log_amount: f64,
    pub deltaOrig: f64,
    pub orig_balance_ratio: f64,
    pub exact_drain_flag: i64,
    pub large_transfer_flag: i64,
    pub is_flagged: i64,
    pub hour: i64,
    pub type_CASH_IN: u8,
    pub type_CASH_OUT: u8,
    pub type_DEBIT: u8,
    pub type_PAYMENT: u8,
    pub type_TRANSFER: u8,
    pub amount_count: f64,
    pub amount_mean: f64,
    pub amount_std: f64,
    pub log_amount_mean: f64,
}

impl FeatureVector {
    /// Flatten into model input order
    pub fn to_array(&self) -> [f32; FEATURE_COUNT] {
        [
            self.log_amount as f32,
            self.deltaOrig as f32,
            self.orig_balance_ratio as f32,
            self.exact_drain_flag as f32,
            self.large_transfer_flag as f32,
            self.is_flagged as f32,
            self.hour as f32,
            self.type_CASH_IN as f32,
            self.type_CASH_OUT as f32,
            self.type_DEBIT as f32,
            self.type_PAYMENT as f32,
            self.type_TRANSFER as f32,
            self.amount_count as f32,
            self.amount_mean as f32,
            self.amount_std as f32,
            self.log_amount_mean as f32,
        ]
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.to_array().to_vec()
    }
}

/// Feature extractor that transforms scoring requests into model input.
pub struct FeatureExtractor {
    stats: AggregateStats,
    reject_unknown_type: bool,
}

impl FeatureExtractor {
    /// Create an extractor with placeholder aggregates that zeroes the
    /// one-hot columns for unknown transaction types.
    pub fn new() -> Self {
        Self::with_options(AggregateStats::default(), false)
    }

    pub fn with_options(stats: AggregateStats, reject_unknown_type: bool) -> Self {
        Self {
            stats,
            reject_unknown_type,
        }
    }

    /// Extract features from a request.
    pub fn extract(&self, request: &ScoreRequest) -> Result<FeatureVector, FeatureError> {
        let transaction_type = TransactionType::parse(&request.transaction_type);
        if transaction_type.is_none() {
            if self.reject_unknown_type {
                return Err(FeatureError::UnknownTransactionType(
                    request.transaction_type.clone(),
                ));
            }
            warn!(
                transaction_type = %request.transaction_type,
                "Unknown transaction type, all type columns set to zero"
            );
        }

        let [cash_in, cash_out, debit, payment, transfer] = TransactionType::one_hot(transaction_type);

        Ok(FeatureVector {
            log_amount: request.amount.ln_1p(),
            deltaOrig: 1.0 - request.orig_balance_ratio,
            orig_balance_ratio: request.orig_balance_ratio,
            exact_drain_flag: request.exact_drain_flag,
            large_transfer_flag: request.large_transfer_flag,
            is_flagged: request.is_flagged,
            hour: request.hour,
            type_CASH_IN: cash_in as u8,
            type_CASH_OUT: cash_out as u8,
            type_DEBIT: debit as u8,
            type_PAYMENT: payment as u8,
            type_TRANSFER: transfer as u8,
            amount_count: self.stats.amount_count,
            amount_mean: self.stats.amount_mean,
            amount_std: self.stats.amount_std,
            log_amount_mean: self.stats.log_amount_mean(),
        })
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model input order.
    pub fn feature_names(&self) -> &'static [&'static str] {
        &FEATURE_NAMES
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(transaction_type: &str) -> ScoreRequest {
        ScoreRequest {
            amount: 181.0,
            orig_balance_ratio: 0.25,
            hour: 14,
            transaction_type: transaction_type.to_string(),
            exact_drain_flag: 1,
            large_transfer_flag: 0,
            is_flagged: 0,
        }
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 16);
        assert_eq!(extractor.feature_names().len(), 16);
        assert_eq!(extractor.feature_names()[1], "deltaOrig");
    }

    #[test]
    fn test_cash_out_extraction() {
        let features = FeatureExtractor::new().extract(&request("CASH_OUT")).unwrap();
        let array = features.to_array();

        assert!((features.log_amount - 182.0_f64.ln()).abs() < 1e-12);
        assert_eq!(features.deltaOrig, 0.75);
        assert_eq!(array[2], 0.25);
        assert_eq!(array[3], 1.0);
        assert_eq!(array[6], 14.0);
        assert_eq!(&array[7..12], &[0.0, 1.0, 0.0, 0.0, 0.0]);
        assert_eq!(array[12], 5.0);
        assert_eq!(array[13], 50000.0);
        assert_eq!(array[14], 20000.0);
        assert!((features.log_amount_mean - 40001.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn test_full_balance_ratio_gives_zero_delta() {
        let mut req = request("PAYMENT");
        req.orig_balance_ratio = 1.0;
        let features = FeatureExtractor::new().extract(&req).unwrap();
        assert_eq!(features.deltaOrig, 0.0);
    }

    #[test]
    fn test_zero_amount_gives_zero_log() {
        let mut req = request("PAYMENT");
        req.amount = 0.0;
        let features = FeatureExtractor::new().extract(&req).unwrap();
        assert_eq!(features.log_amount, 0.0);
    }

    #[test]
    fn test_negative_amount_passes_nan_through() {
        let mut req = request("CASH_OUT");
        req.amount = -5.0;
        let features = FeatureExtractor::new().extract(&req).unwrap();
        assert!(features.log_amount.is_nan());
        assert!(features.to_array()[0].is_nan());

        req.amount = -1.0;
        let features = FeatureExtractor::new().extract(&req).unwrap();
        assert_eq!(features.log_amount, f64::NEG_INFINITY);
    }

    #[test]
    fn test_each_type_sets_one_column() {
        for (index, t) in TransactionType::ALL.iter().enumerate() {
            let features = FeatureExtractor::new().extract(&request(t.as_str())).unwrap();
            let one_hot = &features.to_array()[7..12];
            assert_eq!(one_hot.iter().sum::<f32>(), 1.0);
            assert_eq!(one_hot[index], 1.0);
        }
    }

    #[test]
    fn test_unknown_type_zeroes_one_hot() {
        let features = FeatureExtractor::new().extract(&request("WIRE")).unwrap();
        assert_eq!(&features.to_array()[7..12], &[0.0; 5]);

        // Matching is case-sensitive
        let features = FeatureExtractor::new().extract(&request("cash_out")).unwrap();
        assert_eq!(features.type_CASH_OUT, 0);
    }

    #[test]
    fn test_unknown_type_rejected_when_configured() {
        let extractor = FeatureExtractor::with_options(AggregateStats::default(), true);
        assert_eq!(
            extractor.extract(&request("WIRE")),
            Err(FeatureError::UnknownTransactionType("WIRE".to_string()))
        );
        assert!(extractor.extract(&request("DEBIT")).is_ok());
    }

    #[test]
    fn test_custom_aggregates() {
        let stats = AggregateStats {
            amount_count: 12.0,
            amount_mean: 900.0,
            amount_std: 30.0,
            reference_amount: 0.0,
        };
        let features = FeatureExtractor::with_options(stats, false)
            .extract(&request("DEBIT"))
            .unwrap();
        assert_eq!(features.amount_count, 12.0);
        assert_eq!(features.log_amount_mean, 0.0);
    }

    #[test]
    fn test_feature_vector_serializes_with_model_column_names() {
        let features = FeatureExtractor::new().extract(&request("TRANSFER")).unwrap();
        let json = serde_json::to_value(&features).unwrap();
        for name in FEATURE_NAMES {
            assert!(json.get(name).is_some(), "missing column {}", name);
        }
    }
}
