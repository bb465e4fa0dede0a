//! Type definitions for the fraud detector

pub mod prediction;
pub mod transaction;

pub use prediction::{PredictionResult, Recommendation, ScoreReport};
pub use transaction::{Browser, CardType, Choice, DeviceType, EmailMatch, RawInput};
