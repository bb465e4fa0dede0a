//! Smart Fraud Detector Library
//!
//! Scores one card transaction at a time against a pretrained boosted-tree
//! model: form inputs are mapped onto the model's 20-column feature vector,
//! the model is invoked (bounded to its best iteration when training recorded
//! one) and the probability is rendered with a recommended action.

pub mod app;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod form;
pub mod metrics;
pub mod models;
pub mod render;
pub mod types;

pub use app::Detector;
pub use config::AppConfig;
pub use error::{ConfigurationError, InputError, ModelInvocationError, ModelLoadError};
pub use feature_extractor::{FeatureMapper, FeatureVector};
pub use models::inference::{InferenceEngine, Model};
pub use types::{prediction::PredictionResult, transaction::RawInput};
