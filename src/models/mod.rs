//! ML model loading and inference components

pub mod booster;
pub mod inference;
pub mod loader;
pub mod onnx;

pub use booster::TreeBooster;
pub use inference::{predict, InferenceEngine, InputMatrix, Model, Scorer};
pub use loader::ModelLoader;
pub use onnx::OnnxScorer;
