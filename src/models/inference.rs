//! Inference invocation over a loaded scoring model

use crate::error::{ConfigurationError, ModelInvocationError};
use crate::feature_extractor::{FeatureMapper, FeatureVector};
use crate::types::prediction::{PredictionResult, DEFAULT_THRESHOLD};
use std::ops::Range;
use tracing::debug;

/// Dense input container handed to a scorer (one row per submission).
#[derive(Debug, Clone, PartialEq)]
pub struct InputMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f32>,
    feature_names: Vec<String>,
}

impl InputMatrix {
    /// Single-row matrix named with the training column names.
    pub fn from_vector(vector: &FeatureVector) -> Self {
        Self {
            rows: 1,
            cols: vector.len(),
            values: vector.to_f32(),
            feature_names: crate::feature_extractor::feature_names(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        self.values.get(start..start + self.cols)
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }
}

/// A loaded model that turns input rows into fraud probabilities.
///
/// Implementations are read-only after loading so one model can serve
/// concurrent scoring calls.
pub trait Scorer: Send + Sync {
    /// Short description for logs
    fn name(&self) -> &str;

    /// Number of input columns the model declares, if it declares one.
    fn input_width(&self) -> Option<usize>;

    /// Column names the model was trained with, if recorded.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// One probability per input row. `rounds` restricts boosted ensembles
    /// to the boosting rounds in the range.
    fn predict(
        &self,
        input: &InputMatrix,
        rounds: Option<Range<u32>>,
    ) -> Result<Vec<f32>, ModelInvocationError>;
}

/// A loaded model, tagged by how it must be invoked.
pub enum Model {
    /// Boosted trees trained with early stopping: predictions use rounds
    /// `[0, best_iteration + 1)` only.
    Bounded {
        booster: Box<dyn Scorer>,
        best_iteration: u32,
    },
    /// Invoked over the full model.
    Plain(Box<dyn Scorer>),
}

impl Model {
    pub fn scorer(&self) -> &dyn Scorer {
        match self {
            Model::Bounded { booster, .. } => booster.as_ref(),
            Model::Plain(scorer) => scorer.as_ref(),
        }
    }

    /// Round bound passed to the scorer, if any.
    pub fn iteration_range(&self) -> Option<Range<u32>> {
        match self {
            Model::Bounded { best_iteration, .. } => Some(0..best_iteration.saturating_add(1)),
            Model::Plain(_) => None,
        }
    }

    pub fn best_iteration(&self) -> Option<u32> {
        match self {
            Model::Bounded { best_iteration, .. } => Some(*best_iteration),
            Model::Plain(_) => None,
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Model::Bounded {
                booster,
                best_iteration,
            } => f
                .debug_struct("Bounded")
                .field("booster", &booster.name())
                .field("best_iteration", best_iteration)
                .finish(),
            Model::Plain(scorer) => f.debug_tuple("Plain").field(&scorer.name()).finish(),
        }
    }
}

/// Score one feature vector.
///
/// The vector width is checked against the model's declared width before
/// invocation; the first output is returned as the fraud probability without
/// further calibration.
pub fn predict(model: &Model, vector: &FeatureVector) -> Result<f64, ModelInvocationError> {
    let scorer = model.scorer();
    let input = InputMatrix::from_vector(vector);

    if let Some(expected) = scorer.input_width() {
        if expected != input.cols() {
            return Err(ModelInvocationError::WidthMismatch {
                expected,
                actual: input.cols(),
            });
        }
    }

    let rounds = model.iteration_range();
    debug!(model = %scorer.name(), rounds = ?rounds, "Invoking model");

    let predictions = scorer.predict(&input, rounds)?;
    let probability = predictions
        .first()
        .copied()
        .map(f64::from)
        .ok_or(ModelInvocationError::EmptyOutput)?;

    if !(0.0..=1.0).contains(&probability) {
        return Err(ModelInvocationError::ProbabilityOutOfRange(probability));
    }

    Ok(probability)
}

/// Process-wide inference engine: an immutable model plus the decision
/// threshold.
#[derive(Debug)]
pub struct InferenceEngine {
    model: Model,
    threshold: f64,
}

impl InferenceEngine {
    pub fn new(model: Model) -> Self {
        Self::with_threshold(model, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(model: Model, threshold: f64) -> Self {
        Self { model, threshold }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Reject models whose declared inputs disagree with the mapper's layout.
    pub fn check_compatible(&self, mapper: &FeatureMapper) -> Result<(), ConfigurationError> {
        let scorer = self.model.scorer();

        if let Some(model_width) = scorer.input_width() {
            if model_width != mapper.feature_count() {
                return Err(ConfigurationError::ModelWidthMismatch {
                    model_width,
                    vector_width: mapper.feature_count(),
                });
            }
        }

        if let Some(names) = scorer.feature_names() {
            if names.len() != mapper.feature_count() {
                return Err(ConfigurationError::FeatureNameCount {
                    model_count: names.len(),
                    vector_width: mapper.feature_count(),
                });
            }
            for (index, (model, expected)) in names.iter().zip(mapper.feature_names()).enumerate()
            {
                if *model != expected {
                    return Err(ConfigurationError::FeatureNameMismatch {
                        index,
                        model: model.clone(),
                        expected,
                    });
                }
            }
        }

        Ok(())
    }

    /// Fraud probability for one vector.
    pub fn predict(&self, vector: &FeatureVector) -> Result<f64, ModelInvocationError> {
        predict(&self.model, vector)
    }

    /// Probability judged against the engine's threshold.
    pub fn score(&self, vector: &FeatureVector) -> Result<PredictionResult, ModelInvocationError> {
        let probability = self.predict(vector)?;
        Ok(PredictionResult::with_threshold(probability, self.threshold))
    }

    /// One-line description for startup logs.
    pub fn describe(&self) -> String {
        let scorer = self.model.scorer();
        let width = scorer
            .input_width()
            .map(|w| w.to_string())
            .unwrap_or_else(|| "undeclared".to_string());
        match self.model.best_iteration() {
            Some(best) => format!(
                "{} (inputs: {}, bounded to best iteration {})",
                scorer.name(),
                width,
                best
            ),
            None => format!("{} (inputs: {}, full model)", scorer.name(), width),
        }
    }
}
