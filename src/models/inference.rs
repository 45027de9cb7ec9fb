//! Fraud classifier inference

use crate::config::ModelConfig;
use crate::feature_extractor::FeatureVector;
use crate::models::loader::{LoadedModel, ModelLoader};
use crate::types::response::{FraudLabel, ScoreResponse};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Result of classifying one transaction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    /// Predicted label
    pub label: FraudLabel,
    /// Probability of the fraud class (0.0 - 1.0)
    pub probability: f64,
}

impl From<Classification> for ScoreResponse {
    fn from(c: Classification) -> Self {
        ScoreResponse {
            prediction: c.label,
            probability: c.probability,
        }
    }
}

/// A binary fraud classifier
pub trait Classifier: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Classify one feature vector
    fn classify(&self, features: &FeatureVector) -> Result<Classification>;
}

/// Classifier backed by an ONNX Runtime session
pub struct OnnxClassifier {
    name: String,
    /// `Session::run` needs exclusive access
    model: Mutex<LoadedModel>,
    decision_threshold: f64,
}

impl OnnxClassifier {
    pub fn new(model: LoadedModel, decision_threshold: f64) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
            decision_threshold,
        }
    }

    /// Run the session and read (probability, label) from its outputs
    fn run(&self, features: &[f32]) -> Result<(f64, Option<i64>)> {
        use ort::value::Tensor;

        // Prepare input tensor - shape [1, num_features]
        let shape = vec![1_i64, features.len() as i64];
        let input_tensor = Tensor::from_array((shape, features.to_vec()))
            .context("Failed to create input tensor")?;

        let mut guard = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let model = &mut *guard;

        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])
            .context("ONNX inference failed")?;

        let probability = extract_probability(&outputs, &model.probability_output, &self.name)?;

        let label = model
            .label_output
            .as_deref()
            .and_then(|name| outputs.get(name))
            .and_then(|output| output.try_extract_tensor::<i64>().ok())
            .and_then(|(_, data)| data.first().copied());

        Ok((probability, label))
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        &self.name
    }

    fn classify(&self, features: &FeatureVector) -> Result<Classification> {
        let (probability, label) = self.run(&features.to_array())?;

        // Without a label output, apply the same strict cut-off as the
        // booster's own predict
        let label = match label {
            Some(class) => FraudLabel::from_class(class),
            None if probability > self.decision_threshold => FraudLabel::Fraud,
            None => FraudLabel::NotFraud,
        };

        Ok(Classification { label, probability })
    }
}

/// Extract the fraud probability from model output.
///
/// Handles plain tensor outputs and the `seq(map(int64, float))` shape some
/// exporters produce.
fn extract_probability(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    model_name: &str,
) -> Result<f64> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(prob) = probability_from_value(&output, model_name) {
            return Ok(prob);
        }
    }

    // Fall back to any non-label output we can read
    for (name, output) in outputs.iter() {
        if name.contains("label") || name == output_name {
            continue;
        }
        if let Some(prob) = probability_from_value(&output, model_name) {
            debug!(model = %model_name, output = %name, "Probability read from fallback output");
            return Ok(prob);
        }
    }

    anyhow::bail!("No probability output found for model {}", model_name)
}

fn probability_from_value(output: &ort::value::DynValue, model_name: &str) -> Option<f64> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return fraud_probability_from_tensor(&dims, data);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        match probability_from_sequence_map(output) {
            Ok(prob) => return Some(prob),
            Err(e) => warn!(model = %model_name, error = %e, "Failed to read seq(map) output"),
        }
    }

    None
}

/// Read class 1 from a `seq(map(int64, float))` output
fn probability_from_sequence_map(output: &ort::value::DynValue) -> Result<f64> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
    let first = maps
        .first()
        .ok_or_else(|| anyhow::anyhow!("Empty sequence"))?;
    let pairs = first.try_extract_key_values::<i64, f32>()?;

    class_one_probability(&pairs).ok_or_else(|| anyhow::anyhow!("No probability found in map"))
}

/// Fraud probability from `(class, probability)` pairs
fn class_one_probability(pairs: &[(i64, f32)]) -> Option<f64> {
    if let Some((_, p)) = pairs.iter().find(|(class, _)| *class == 1) {
        return Some(*p as f64);
    }
    pairs
        .iter()
        .find(|(class, _)| *class == 0)
        .map(|(_, p)| 1.0 - *p as f64)
}

/// Fraud probability from a probability tensor of the first batch row
fn fraud_probability_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = match dims {
        [_, classes] | [classes] => *classes,
        _ => return data.last().map(|&v| v as f64),
    };

    match classes {
        c if c >= 2 => data.get(1).map(|&v| v as f64),
        1 => data.first().map(|&v| v as f64),
        _ => None,
    }
}

/// Owns the process-wide classifier.
pub struct InferenceEngine {
    classifier: Box<dyn Classifier>,
}

impl InferenceEngine {
    /// Load the ONNX classifier named by the configuration
    pub fn load(config: &ModelConfig) -> Result<Self> {
        let loader = ModelLoader::with_threads(config.onnx_threads);
        let model = loader.load_model(&config.path, &config.name)?;
        let classifier = OnnxClassifier::new(model, config.decision_threshold);

        info!(
            model = %config.name,
            decision_threshold = config.decision_threshold,
            "Inference engine initialized"
        );

        Ok(Self::from_classifier(classifier))
    }

    /// Wrap an existing classifier
    pub fn from_classifier<C: Classifier + 'static>(classifier: C) -> Self {
        Self {
            classifier: Box::new(classifier),
        }
    }

    pub fn model_name(&self) -> &str {
        self.classifier.name()
    }

    /// Classify one transaction
    pub fn predict(&self, features: &FeatureVector) -> Result<Classification> {
        let classification = self
            .classifier
            .classify(features)
            .with_context(|| format!("Model {} failed to classify", self.model_name()))?;

        if !classification.probability.is_finite() {
            anyhow::bail!(
                "Model {} returned a non-finite probability",
                self.model_name()
            );
        }

        debug!(
            model = %self.model_name(),
            label = %classification.label,
            probability = classification.probability,
            "Inference complete"
        );

        Ok(classification)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::FeatureExtractor;
    use crate::types::request::ScoreRequest;

    struct FixedClassifier(f64);

    impl Classifier for FixedClassifier {
        fn name(&self) -> &str {
            "fixed"
        }

        fn classify(&self, _features: &FeatureVector) -> Result<Classification> {
            let label = if self.0 > 0.5 {
                FraudLabel::Fraud
            } else {
                FraudLabel::NotFraud
            };
            Ok(Classification {
                label,
                probability: self.0,
            })
        }
    }

    struct FailingClassifier;

    impl Classifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn classify(&self, _features: &FeatureVector) -> Result<Classification> {
            anyhow::bail!("session exploded")
        }
    }

    fn features() -> FeatureVector {
        let request = ScoreRequest {
            amount: 100.0,
            orig_balance_ratio: 0.5,
            hour: 3,
            transaction_type: "TRANSFER".to_string(),
            exact_drain_flag: 0,
            large_transfer_flag: 0,
            is_flagged: 0,
        };
        FeatureExtractor::new().extract(&request).unwrap()
    }

    #[test]
    fn test_engine_passes_through_classification() {
        let engine = InferenceEngine::from_classifier(FixedClassifier(0.9));
        let result = engine.predict(&features()).unwrap();
        assert_eq!(result.label, FraudLabel::Fraud);
        assert_eq!(result.probability, 0.9);
        assert_eq!(engine.model_name(), "fixed");

        let response: ScoreResponse = result.into();
        assert_eq!(response.prediction, FraudLabel::Fraud);
    }

    #[test]
    fn test_engine_wraps_classifier_errors() {
        let engine = InferenceEngine::from_classifier(FailingClassifier);
        let err = engine.predict(&features()).unwrap_err();
        assert_eq!(
            format!("{:#}", err),
            "Model failing failed to classify: session exploded"
        );
    }

    #[test]
    fn test_engine_rejects_nan_probability() {
        let engine = InferenceEngine::from_classifier(FixedClassifier(f64::NAN));
        assert!(engine.predict(&features()).is_err());
    }

    #[test]
    fn test_tensor_probability_layouts() {
        assert_eq!(fraud_probability_from_tensor(&[1, 2], &[0.25, 0.75]), Some(0.75));
        assert_eq!(fraud_probability_from_tensor(&[2], &[0.5, 0.5]), Some(0.5));
        assert_eq!(fraud_probability_from_tensor(&[1, 1], &[0.125]), Some(0.125));
        assert_eq!(fraud_probability_from_tensor(&[1, 1, 3], &[0.1, 0.2, 0.375]), Some(0.375));
        assert_eq!(fraud_probability_from_tensor(&[1, 0], &[]), None);
    }

    #[test]
    fn test_class_one_probability() {
        assert_eq!(class_one_probability(&[(0, 0.75), (1, 0.25)]), Some(0.25));
        assert_eq!(class_one_probability(&[(0, 0.75)]), Some(0.25));
        assert_eq!(class_one_probability(&[]), None);
    }
}
