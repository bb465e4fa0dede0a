//! Session driver: startup checks, then the form → map → score → render loop.

use crate::config::AppConfig;
use crate::error::ConfigurationError;
use crate::feature_extractor::FeatureMapper;
use crate::form::TerminalForm;
use crate::metrics::SessionMetrics;
use crate::models::{InferenceEngine, ModelLoader};
use crate::render::Renderer;
use crate::types::{PredictionResult, RawInput};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Mapper and inference engine, checked against each other.
#[derive(Debug)]
pub struct Detector {
    mapper: FeatureMapper,
    engine: InferenceEngine,
}

impl Detector {
    /// Pair a mapper with an engine, rejecting models whose inputs disagree
    /// with the mapper's layout.
    pub fn new(mapper: FeatureMapper, engine: InferenceEngine) -> Result<Self, ConfigurationError> {
        engine.check_compatible(&mapper)?;
        Ok(Self { mapper, engine })
    }

    /// Build the mapper and load the configured model.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let mapper = FeatureMapper::new().context("Invalid feature layout")?;
        info!(
            features = mapper.feature_count(),
            mapped = mapper.mapped_slots().len(),
            "Feature mapper initialized"
        );

        let model = ModelLoader::new()
            .load(&config.model.path)
            .context("Failed to load fraud model")?;
        let engine = InferenceEngine::with_threshold(model, config.detection.threshold);

        let detector = Self::new(mapper, engine).context("Model does not match feature layout")?;
        info!(
            model = %detector.engine.describe(),
            threshold = detector.engine.threshold(),
            "Inference engine ready"
        );
        Ok(detector)
    }

    pub fn mapper(&self) -> &FeatureMapper {
        &self.mapper
    }

    pub fn engine(&self) -> &InferenceEngine {
        &self.engine
    }

    /// Validate, map and score one submission.
    pub fn score(&self, raw: &RawInput) -> Result<PredictionResult> {
        raw.validate()?;
        let vector = self.mapper.map(raw);
        debug!(features = ?vector.as_slice(), "Features mapped");
        Ok(self.engine.score(&vector)?)
    }
}

/// Load everything, then run the interactive session.
///
/// Nothing is written to `output` unless the model loads and matches the
/// feature layout.
pub fn run<R: BufRead, W: Write>(config: &AppConfig, input: R, output: W) -> Result<SessionMetrics> {
    let detector = Detector::from_config(config)?;
    run_session(&detector, Renderer::new(config.output.format), input, output)
}

/// Score submissions until input ends or the operator stops.
pub fn run_session<R: BufRead, W: Write>(
    detector: &Detector,
    renderer: Renderer,
    input: R,
    output: W,
) -> Result<SessionMetrics> {
    let metrics = SessionMetrics::new();
    let mut form = TerminalForm::new(input, output);
    form.header()?;

    while let Some(raw) = form.collect()? {
        let started = Instant::now();

        match detector.score(&raw) {
            Ok(result) => {
                let elapsed = started.elapsed();
                metrics.record_score(elapsed, result.probability, result.flagged());
                info!(
                    probability = result.probability,
                    flagged = result.flagged(),
                    scoring_time_us = elapsed.as_micros() as u64,
                    "Transaction scored"
                );
                form.show(&renderer.result(&result)?)?;
            }
            Err(e) => {
                metrics.record_failure();
                warn!(error = %format!("{e:#}"), "Scoring failed");
                form.show(&renderer.error(&format!("{e:#}")))?;
            }
        }

        if !form.confirm("Score another transaction?")? {
            break;
        }
    }

    info!("Session ending");
    metrics.print_summary();
    Ok(metrics)
}
