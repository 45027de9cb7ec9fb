//! ONNX model loader

use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use std::path::Path;
use tracing::info;

/// Loaded ONNX model with metadata
pub struct LoadedModel {
    /// Model name
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the model
    pub input_name: String,
    /// Output carrying class probabilities
    pub probability_output: String,
    /// Output carrying the predicted class, if the export kept it
    pub label_output: Option<String>,
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a loader that runs inference with the given number of threads
    pub fn with_threads(onnx_threads: usize) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
        }
    }

    /// Load a classifier from an ONNX file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        ort::init().commit()?;
        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        let label_output = output_names.iter().find(|n| n.contains("label")).cloned();
        let probability_output = pick_probability_output(&output_names);

        info!(
            model = %name,
            input = %input_name,
            probability_output = %probability_output,
            label_output = ?label_output,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            probability_output,
            label_output,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::with_threads(1)
    }
}

/// Choose the probability output among a model's outputs.
///
/// Prefers a name mentioning `prob`, then any non-label output, then the
/// last output.
fn pick_probability_output(names: &[String]) -> String {
    names
        .iter()
        .find(|n| n.contains("prob"))
        .or_else(|| names.iter().find(|n| !n.contains("label")))
        .or_else(|| names.last())
        .cloned()
        .unwrap_or_else(|| "probabilities".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_probability_output_selection() {
        assert_eq!(
            pick_probability_output(&names(&["label", "probabilities"])),
            "probabilities"
        );
        assert_eq!(
            pick_probability_output(&names(&["output_label", "output_probability"])),
            "output_probability"
        );
        assert_eq!(pick_probability_output(&names(&["label", "scores"])), "scores");
        assert_eq!(pick_probability_output(&names(&["label"])), "label");
        assert_eq!(pick_probability_output(&[]), "probabilities");
    }

    #[test]
    fn test_missing_model_file() {
        let loader = ModelLoader::with_threads(0);
        let err = loader
            .load_model("models/does_not_exist.onnx", "xgboost")
            .err()
            .unwrap();
        assert!(err.to_string().contains("Model file not found"));
    }
}
