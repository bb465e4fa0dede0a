//! Error taxonomy for model loading, invocation and startup configuration.

use std::path::PathBuf;
use thiserror::Error;

/// The model artifact could not be turned into a usable [`Model`].
///
/// Always fatal: the form is never shown when loading fails.
///
/// [`Model`]: crate::models::inference::Model
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("model file '{}' not found; place it next to the binary or set model.path", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read model file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model file '{}' is not valid XGBoost JSON", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model file '{}' is malformed: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("model file '{}' has an unsupported format (expected .json or .onnx)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("objective '{0}' does not produce a fraud probability")]
    UnsupportedObjective(String),

    #[error("booster type '{0}' is not supported (only gbtree)")]
    UnsupportedBooster(String),

    #[error("failed to load ONNX model '{}': {reason}", path.display())]
    Onnx { path: PathBuf, reason: String },
}

/// A single scoring call failed. Fatal for that submission only.
#[derive(Debug, Error, PartialEq)]
pub enum ModelInvocationError {
    #[error("model expects {expected} input columns but received {actual}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("model '{0}' cannot limit prediction to an iteration range")]
    RangeUnsupported(String),

    #[error("iteration range ends at round {end} but the model has {rounds} rounds")]
    IterationRangeOutOfBounds { end: u32, rounds: u32 },

    #[error("model returned no predictions")]
    EmptyOutput,

    #[error("model returned {0}, which is not a probability")]
    ProbabilityOutOfRange(f64),

    #[error("model backend failed: {0}")]
    Backend(String),
}

/// Internal mapping tables disagree with themselves or with the loaded model.
///
/// Detected at startup, never per request.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigurationError {
    #[error("field '{field}' is assigned to slot {slot}, outside the {width}-slot vector")]
    SlotOutOfRange {
        field: &'static str,
        slot: usize,
        width: usize,
    },

    #[error("slot {slot} is assigned to both '{first}' and '{second}'")]
    DuplicateSlot {
        slot: usize,
        first: &'static str,
        second: &'static str,
    },

    #[error("field '{0}' has no slot (or more than one) in the feature layout")]
    UnassignedField(&'static str),

    #[error("encoding table '{table}' has no code for '{label}'")]
    MissingCode {
        table: &'static str,
        label: &'static str,
    },

    #[error("model declares {model_width} input columns but the feature vector has {vector_width}")]
    ModelWidthMismatch {
        model_width: usize,
        vector_width: usize,
    },

    #[error("model names {model_count} input columns but the feature vector has {vector_width}")]
    FeatureNameCount {
        model_count: usize,
        vector_width: usize,
    },

    #[error("model column {index} is named '{model}' but the feature vector names it '{expected}'")]
    FeatureNameMismatch {
        index: usize,
        model: String,
        expected: String,
    },
}

/// A form answer that violates its field's constraint.
#[derive(Debug, Error, PartialEq)]
#[error("{field}: {reason}")]
pub struct InputError {
    pub field: &'static str,
    pub reason: String,
}

impl InputError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}
