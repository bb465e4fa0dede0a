//! Prediction results and the report rendered to the operator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Probability above which a transaction is flagged.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Recommendation shown next to the probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Review,
    Proceed,
}

impl Recommendation {
    /// Headline verdict
    pub fn verdict(self) -> &'static str {
        match self {
            Recommendation::Review => "Likely Fraudulent!",
            Recommendation::Proceed => "Legitimate Transaction",
        }
    }

    /// Recommended operator action
    pub fn action(self) -> &'static str {
        match self {
            Recommendation::Review => {
                "Review transaction, potentially flag for manual check or decline."
            }
            Recommendation::Proceed => "Proceed with transaction.",
        }
    }
}

/// Outcome of scoring one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    /// Fraud probability (0.0 - 1.0)
    pub probability: f64,
    /// Decision threshold the result was judged against
    pub threshold: f64,
}

impl PredictionResult {
    /// Judge a probability against the default 0.5 threshold.
    pub fn new(probability: f64) -> Self {
        Self::with_threshold(probability, DEFAULT_THRESHOLD)
    }

    pub fn with_threshold(probability: f64, threshold: f64) -> Self {
        Self {
            probability,
            threshold,
        }
    }

    /// Strictly above the threshold; a probability equal to it is not flagged.
    pub fn flagged(&self) -> bool {
        self.probability > self.threshold
    }

    pub fn recommendation(&self) -> Recommendation {
        if self.flagged() {
            Recommendation::Review
        } else {
            Recommendation::Proceed
        }
    }

    /// Wrap the result in a timestamped, uniquely identified report.
    pub fn to_report(&self) -> ScoreReport {
        let recommendation = self.recommendation();
        ScoreReport {
            submission_id: uuid::Uuid::new_v4().to_string(),
            scored_at: Utc::now(),
            probability: self.probability,
            flagged: self.flagged(),
            recommendation,
            verdict: recommendation.verdict().to_string(),
            action: recommendation.action().to_string(),
        }
    }
}

/// Serializable record of one scoring pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreReport {
    /// Unique submission identifier
    pub submission_id: String,

    /// When the submission was scored
    pub scored_at: DateTime<Utc>,

    /// Fraud probability (0.0 - 1.0)
    pub probability: f64,

    /// Probability exceeded the threshold
    pub flagged: bool,

    pub recommendation: Recommendation,

    /// Headline shown to the operator
    pub verdict: String,

    /// Recommended action shown to the operator
    pub action: String,
}
