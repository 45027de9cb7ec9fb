//! Scoring request parsing and validation

use crate::error::ApiError;
use serde_json::{Map, Value};

/// Fields every scoring request must carry, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 7] = [
    "amount",
    "orig_balance_ratio",
    "hour",
    "transaction_type",
    "exact_drain_flag",
    "large_transfer_flag",
    "is_flagged",
];

/// A validated scoring request.
///
/// Numeric fields are coerced loosely: numbers, booleans and numeric strings
/// are all accepted. `transaction_type` is kept raw so that the feature
/// transform decides what to do with unknown values.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRequest {
    /// Transaction amount
    pub amount: f64,
    /// Share of the origin balance left after the transaction, expected in [0, 1]
    pub orig_balance_ratio: f64,
    /// Hour of day the transaction happened
    pub hour: i64,
    /// Raw transaction type (CASH_IN, CASH_OUT, DEBIT, PAYMENT, TRANSFER)
    pub transaction_type: String,
    /// Transaction drained the origin account to exactly zero
    pub exact_drain_flag: i64,
    /// Amount above the large-transfer limit
    pub large_transfer_flag: i64,
    /// Flagged by upstream business rules
    pub is_flagged: i64,
}

impl ScoreRequest {
    /// Parse a raw request body.
    pub fn from_slice(body: &[u8]) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_slice(body).map_err(|e| ApiError::InvalidJson {
            details: e.to_string(),
        })?;
        Self::from_json(&value)
    }

    /// Validate an already-decoded JSON document.
    pub fn from_json(value: &Value) -> Result<Self, ApiError> {
        let data = value.as_object().ok_or_else(|| ApiError::InvalidJson {
            details: format!("expected a JSON object, got {}", json_type(value)),
        })?;

        if let Some(missing) = REQUIRED_FIELDS.iter().find(|f| !data.contains_key(**f)) {
            return Err(ApiError::MissingField(*missing));
        }

        Ok(Self {
            amount: float_field(data, "amount")?,
            orig_balance_ratio: float_field(data, "orig_balance_ratio")?,
            hour: int_field(data, "hour")?,
            transaction_type: match &data["transaction_type"] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            exact_drain_flag: int_field(data, "exact_drain_flag")?,
            large_transfer_flag: int_field(data, "large_transfer_flag")?,
            is_flagged: int_field(data, "is_flagged")?,
        })
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ApiError {
    ApiError::InvalidField {
        field,
        reason: reason.into(),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn float_field(data: &Map<String, Value>, field: &'static str) -> Result<f64, ApiError> {
    match &data[field] {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| invalid(field, format!("number out of range: {}", n))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| invalid(field, format!("could not convert string to float: '{}'", s))),
        other => Err(invalid(
            field,
            format!("expected a number, got {}", json_type(other)),
        )),
    }
}

fn int_field(data: &Map<String, Value>, field: &'static str) -> Result<i64, ApiError> {
    match &data[field] {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            // Floats truncate toward zero
            match n.as_f64() {
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(f.trunc() as i64),
                _ => Err(invalid(field, format!("integer out of range: {}", n))),
            }
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| invalid(field, format!("invalid literal for integer: '{}'", s))),
        other => Err(invalid(
            field,
            format!("expected an integer, got {}", json_type(other)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_body() -> Value {
        json!({
            "amount": 181.0,
            "orig_balance_ratio": 1.0,
            "hour": 1,
            "transaction_type": "CASH_OUT",
            "exact_drain_flag": 1,
            "large_transfer_flag": 0,
            "is_flagged": 0
        })
    }

    #[test]
    fn test_valid_request() {
        let request = ScoreRequest::from_json(&valid_body()).unwrap();
        assert_eq!(request.amount, 181.0);
        assert_eq!(request.hour, 1);
        assert_eq!(request.transaction_type, "CASH_OUT");
        assert_eq!(request.exact_drain_flag, 1);
    }

    #[test]
    fn test_each_missing_field_is_named() {
        for field in REQUIRED_FIELDS {
            let mut body = valid_body();
            body.as_object_mut().unwrap().remove(field);

            match ScoreRequest::from_json(&body) {
                Err(ApiError::MissingField(name)) => assert_eq!(name, field),
                other => panic!("expected missing {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_first_missing_field_reported() {
        let body = json!({ "hour": 3 });
        let err = ScoreRequest::from_json(&body).unwrap_err();
        assert_eq!(err.to_string(), "Missing required field: amount");
    }

    #[test]
    fn test_loose_numeric_coercion() {
        let mut body = valid_body();
        let data = body.as_object_mut().unwrap();
        data.insert("amount".into(), json!(" 250.5 "));
        data.insert("hour".into(), json!(13.9));
        data.insert("is_flagged".into(), json!(true));
        data.insert("large_transfer_flag".into(), json!("1"));

        let request = ScoreRequest::from_json(&body).unwrap();
        assert_eq!(request.amount, 250.5);
        assert_eq!(request.hour, 13);
        assert_eq!(request.is_flagged, 1);
        assert_eq!(request.large_transfer_flag, 1);
    }

    #[test]
    fn test_unparseable_values_rejected() {
        let mut body = valid_body();
        body["amount"] = json!("abc");
        match ScoreRequest::from_json(&body) {
            Err(ApiError::InvalidField { field, .. }) => assert_eq!(field, "amount"),
            other => panic!("unexpected {:?}", other),
        }

        let mut body = valid_body();
        body["hour"] = json!("12.5");
        assert!(matches!(
            ScoreRequest::from_json(&body),
            Err(ApiError::InvalidField { field: "hour", .. })
        ));

        let mut body = valid_body();
        body["orig_balance_ratio"] = Value::Null;
        assert!(matches!(
            ScoreRequest::from_json(&body),
            Err(ApiError::InvalidField {
                field: "orig_balance_ratio",
                ..
            })
        ));
    }

    #[test]
    fn test_non_string_transaction_type_kept_raw() {
        let mut body = valid_body();
        body["transaction_type"] = json!(3);
        let request = ScoreRequest::from_json(&body).unwrap();
        assert_eq!(request.transaction_type, "3");
    }

    #[test]
    fn test_non_object_body() {
        let err = ScoreRequest::from_json(&json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidJson { .. }));
    }

    #[test]
    fn test_invalid_json_bytes() {
        let err = ScoreRequest::from_slice(b"{\"amount\": ").unwrap_err();
        assert_eq!(err.to_string(), "Invalid JSON format");
        assert!(err.body().details.is_some());
    }
}
