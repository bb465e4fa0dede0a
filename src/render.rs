//! Operator-facing rendering of scoring results

use crate::config::OutputFormat;
use crate::types::prediction::{PredictionResult, ScoreReport};
use anyhow::{Context, Result};

/// Turns results and per-request errors into output text.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    format: OutputFormat,
}

impl Renderer {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn result(&self, result: &PredictionResult) -> Result<String> {
        match self.format {
            OutputFormat::Text => Ok(render_text(result)),
            OutputFormat::Json => render_json(&result.to_report()),
        }
    }

    /// A failed submission; the session carries on after it.
    pub fn error(&self, error: &dyn std::fmt::Display) -> String {
        match self.format {
            OutputFormat::Text => format!("An error occurred during prediction: {error}"),
            OutputFormat::Json => serde_json::json!({ "error": error.to_string() }).to_string(),
        }
    }
}

/// Probability to four decimals, then the verdict and recommended action.
pub fn render_text(result: &PredictionResult) -> String {
    let recommendation = result.recommendation();
    format!(
        "Fraud Probability: {:.4}\n{}\nAction Recommended: {}",
        result.probability,
        recommendation.verdict(),
        recommendation.action()
    )
}

/// One report as a single JSON line.
pub fn render_json(report: &ScoreReport) -> Result<String> {
    serde_json::to_string(report).context("Failed to serialize score report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelInvocationError;

    #[test]
    fn test_text_flagged() {
        let text = render_text(&PredictionResult::new(0.91234));
        assert_eq!(
            text,
            "Fraud Probability: 0.9123\n\
             Likely Fraudulent!\n\
             Action Recommended: Review transaction, potentially flag for manual check or decline."
        );
    }

    #[test]
    fn test_text_legitimate_at_threshold() {
        let text = render_text(&PredictionResult::new(0.5));
        assert_eq!(
            text,
            "Fraud Probability: 0.5000\n\
             Legitimate Transaction\n\
             Action Recommended: Proceed with transaction."
        );
    }

    #[test]
    fn test_json_line() {
        let renderer = Renderer::new(OutputFormat::Json);
        let line = renderer
            .result(&PredictionResult::with_threshold(0.42, 0.4))
            .unwrap();
        assert!(!line.contains('\n'));

        let report: ScoreReport = serde_json::from_str(&line).unwrap();
        assert_eq!(report.probability, 0.42);
        assert!(report.flagged);
        assert_eq!(report.verdict, "Likely Fraudulent!");
        assert!(uuid::Uuid::parse_str(&report.submission_id).is_ok());
    }

    #[test]
    fn test_error_line() {
        let err = ModelInvocationError::EmptyOutput;

        let text = Renderer::new(OutputFormat::Text).error(&err);
        assert!(text.starts_with("An error occurred during prediction: "));

        let json = Renderer::new(OutputFormat::Json).error(&err);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["error"], err.to_string());
    }
}
