//! ONNX Runtime scorer for classifiers exported to ONNX

use crate::error::{ModelInvocationError, ModelLoadError};
use crate::models::inference::{InputMatrix, Scorer};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::{DynMapValueType, DynSequenceValueType, DowncastableTarget, ValueType};
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Exported classifier run through ONNX Runtime.
///
/// ONNX graphs carry no boosting-round bookkeeping, so this scorer is always
/// invoked over the full model.
pub struct OnnxScorer {
    name: String,
    /// Running a session needs exclusive access.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    input_width: Option<usize>,
}

impl OnnxScorer {
    /// Load an ONNX model from file
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        Self::load(path).map_err(|e| ModelLoadError::Onnx {
            path: path.to_path_buf(),
            reason: format!("{e:#}"),
        })
    }

    fn load(path: &Path) -> Result<Self> {
        ort::init().commit()?;

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input = session
            .inputs
            .first()
            .context("model declares no inputs")?;
        let input_name = input.name.clone();
        let input_width = match &input.input_type {
            // Last dimension is the column count; -1 means it is dynamic.
            ValueType::Tensor { shape, .. } => shape
                .iter()
                .last()
                .and_then(|&d| usize::try_from(d).ok()),
            _ => None,
        };

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob") || o.name.contains("output"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .unwrap_or_else(|| "probabilities".to_string());

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "onnx".to_string());

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            width = ?input_width,
            "ONNX model loaded"
        );

        Ok(Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            input_width,
        })
    }

    fn run(&self, row: &[f32]) -> Result<f64> {
        use ort::value::Tensor;

        let shape = vec![1_i64, row.len() as i64];
        let input_tensor =
            Tensor::from_array((shape, row.to_vec())).context("Failed to create input tensor")?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let outputs = session.run(ort::inputs![self.input_name.as_str() => input_tensor])?;

        self.extract_probability(&outputs)
    }

    /// Fraud probability from either a tensor output (XGBoost, random forest)
    /// or a `seq(map(int64, float))` output (LightGBM, CatBoost).
    fn extract_probability(&self, outputs: &ort::session::SessionOutputs) -> Result<f64> {
        if let Some(output) = outputs.get(self.output_name.as_str()) {
            if let Some(prob) = self.extract_from_value(&output) {
                return Ok(prob);
            }
        }

        for (name, output) in outputs.iter() {
            if name.contains("label") {
                continue;
            }
            if let Some(prob) = self.extract_from_value(&output) {
                debug!(model = %self.name, output = %name, prob = prob, "Extracted from fallback output");
                return Ok(prob);
            }
        }

        anyhow::bail!("no probability output found")
    }

    fn extract_from_value(&self, output: &ort::value::DynValue) -> Option<f64> {
        if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
            let dims: Vec<i64> = shape.iter().copied().collect();
            return fraud_prob_from_tensor(&dims, data);
        }

        if DynSequenceValueType::can_downcast(&output.dtype()) {
            match self.extract_from_sequence_map(output) {
                Ok(prob) => return Some(prob),
                Err(e) => warn!(model = %self.name, error = %e, "Unreadable seq(map) output"),
            }
        }

        None
    }

    fn extract_from_sequence_map(&self, output: &ort::value::DynValue) -> Result<f64> {
        let allocator = Allocator::default();

        let sequence = output
            .downcast_ref::<DynSequenceValueType>()
            .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
        let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;
        let first = maps.first().context("Empty sequence")?;
        let kv_pairs = first.try_extract_key_values::<i64, f32>()?;

        fraud_prob_from_class_map(&kv_pairs).context("No probability found in map")
    }
}

/// `[batch, classes]` or `[classes]` probabilities: class 1 when present,
/// otherwise the single value.
fn fraud_prob_from_tensor(dims: &[i64], data: &[f32]) -> Option<f64> {
    let classes = dims.last().copied().unwrap_or(0);
    match classes {
        c if c >= 2 => data.get(1).map(|&v| v as f64),
        1 => data.first().map(|&v| v as f64),
        _ => None,
    }
}

/// Class id → probability pairs: class 1 directly, or the complement of class 0.
fn fraud_prob_from_class_map(pairs: &[(i64, f32)]) -> Option<f64> {
    if let Some((_, prob)) = pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Some(*prob as f64);
    }
    pairs
        .iter()
        .find(|(class_id, _)| *class_id == 0)
        .map(|(_, prob)| 1.0 - *prob as f64)
}

/// ONNX graphs cannot be cut to a round range.
fn require_full_model(name: &str, rounds: Option<&Range<u32>>) -> Result<(), ModelInvocationError> {
    match rounds {
        Some(_) => Err(ModelInvocationError::RangeUnsupported(name.to_string())),
        None => Ok(()),
    }
}

impl Scorer for OnnxScorer {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }

    fn predict(
        &self,
        input: &InputMatrix,
        rounds: Option<Range<u32>>,
    ) -> Result<Vec<f32>, ModelInvocationError> {
        require_full_model(&self.name, rounds.as_ref())?;

        (0..input.rows())
            .map(|i| {
                let row = input.row(i).ok_or(ModelInvocationError::EmptyOutput)?;
                self.run(row)
                    .map(|p| p as f32)
                    .map_err(|e| ModelInvocationError::Backend(format!("{e:#}")))
            })
            .collect()
    }
}
