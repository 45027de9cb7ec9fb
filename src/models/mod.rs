//! ML model inference components

pub mod inference;
pub mod loader;

pub use inference::{Classification, Classifier, InferenceEngine, OnnxClassifier};
pub use loader::ModelLoader;
