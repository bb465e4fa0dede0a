//! Boosted-tree scorer for models saved in XGBoost's JSON format.
//!
//! Only what a binary fraud classifier needs is supported: `gbtree` boosters,
//! logistic objectives and numerical splits. Trees are validated when loaded
//! so evaluation never indexes out of bounds or loops.

use crate::error::{ModelInvocationError, ModelLoadError};
use crate::models::inference::{InputMatrix, Scorer};
use serde::Deserialize;
use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct ModelFile {
    learner: LearnerJson,
}

#[derive(Debug, Deserialize)]
struct LearnerJson {
    #[serde(default)]
    attributes: HashMap<String, String>,
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBoosterJson,
    learner_model_param: LearnerModelParamJson,
    objective: ObjectiveJson,
}

#[derive(Debug, Deserialize)]
struct GradientBoosterJson {
    name: String,
    model: Option<GbTreeModelJson>,
}

#[derive(Debug, Deserialize)]
struct GbTreeModelJson {
    #[serde(default)]
    gbtree_model_param: HashMap<String, String>,
    trees: Vec<TreeJson>,
    #[serde(default)]
    tree_info: Vec<i32>,
    #[serde(default)]
    iteration_indptr: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParamJson {
    base_score: String,
    #[serde(default)]
    num_class: Option<String>,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct ObjectiveJson {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    default_left: Vec<FlagJson>,
    #[serde(default)]
    split_type: Vec<u8>,
}

/// XGBoost writes `default_left` as 0/1 integers in some versions and as
/// booleans in others.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum FlagJson {
    Bool(bool),
    Int(u8),
}

impl FlagJson {
    fn is_set(self) -> bool {
        match self {
            FlagJson::Bool(b) => b,
            FlagJson::Int(i) => i != 0,
        }
    }
}

/// One regression tree in flat array form.
#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i32>,
    right: Vec<i32>,
    feature: Vec<u32>,
    /// Split threshold for internal nodes, leaf value for leaves.
    value: Vec<f32>,
    default_left: Vec<bool>,
}

impl Tree {
    fn from_json(json: TreeJson, num_feature: usize) -> Result<Self, String> {
        let n = json.left_children.len();
        if n == 0 {
            return Err("tree has no nodes".to_string());
        }
        if json.right_children.len() != n
            || json.split_indices.len() != n
            || json.split_conditions.len() != n
            || json.default_left.len() != n
        {
            return Err("tree arrays have different lengths".to_string());
        }
        if json.split_type.iter().any(|&t| t != 0) {
            return Err("categorical splits are not supported".to_string());
        }

        for node in 0..n {
            let (left, right) = (json.left_children[node], json.right_children[node]);
            if left == -1 && right == -1 {
                continue;
            }
            // Children always follow their parent, which also rules out cycles.
            for child in [left, right] {
                if child <= node as i32 || child as usize >= n {
                    return Err(format!("node {node} has invalid child {child}"));
                }
            }
            if json.split_indices[node] as usize >= num_feature {
                return Err(format!(
                    "node {node} splits on feature {} but the model has {num_feature}",
                    json.split_indices[node]
                ));
            }
        }

        Ok(Self {
            left: json.left_children,
            right: json.right_children,
            feature: json.split_indices,
            value: json.split_conditions,
            default_left: json.default_left.into_iter().map(FlagJson::is_set).collect(),
        })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut node = 0usize;
        loop {
            let left = self.left[node];
            if left == -1 {
                return self.value[node];
            }
            let x = row
                .get(self.feature[node] as usize)
                .copied()
                .unwrap_or(f32::NAN);
            let next = if x.is_nan() {
                if self.default_left[node] {
                    left
                } else {
                    self.right[node]
                }
            } else if x < self.value[node] {
                left
            } else {
                self.right[node]
            };
            node = next as usize;
        }
    }
}

/// Gradient-boosted tree ensemble with a logistic output.
#[derive(Debug, Clone)]
pub struct TreeBooster {
    name: String,
    trees: Vec<Tree>,
    /// Start offset of each boosting round in `trees`, plus the end.
    round_offsets: Vec<usize>,
    base_margin: f32,
    num_feature: usize,
    feature_names: Option<Vec<String>>,
    best_iteration: Option<u32>,
}

impl TreeBooster {
    /// Load a booster saved with `save_model("*.json")`.
    pub fn from_file(path: &Path) -> Result<Self, ModelLoadError> {
        let bytes = std::fs::read(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes, path)
    }

    /// Parse a JSON model; `path` is used for naming and error messages.
    pub fn from_slice(bytes: &[u8], path: &Path) -> Result<Self, ModelLoadError> {
        let file: ModelFile =
            serde_json::from_slice(bytes).map_err(|source| ModelLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_model_file(file, path)
    }

    fn from_model_file(file: ModelFile, path: &Path) -> Result<Self, ModelLoadError> {
        let malformed = |reason: String| ModelLoadError::Malformed {
            path: PathBuf::from(path),
            reason,
        };
        let learner = file.learner;

        let objective = learner.objective.name;
        if objective != "binary:logistic" && objective != "reg:logistic" {
            return Err(ModelLoadError::UnsupportedObjective(objective));
        }

        if learner.gradient_booster.name != "gbtree" {
            return Err(ModelLoadError::UnsupportedBooster(
                learner.gradient_booster.name,
            ));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| malformed("gbtree booster has no model".to_string()))?;

        let params = learner.learner_model_param;
        let num_feature: usize = params
            .num_feature
            .trim()
            .parse()
            .map_err(|_| malformed(format!("invalid num_feature '{}'", params.num_feature)))?;
        let num_class: usize = match params.num_class.as_deref() {
            Some(s) => s
                .trim()
                .parse()
                .map_err(|_| malformed(format!("invalid num_class '{s}'")))?,
            None => 0,
        };
        if num_class > 1 {
            return Err(malformed(format!(
                "{num_class}-class models are not supported, expected a binary classifier"
            )));
        }
        let base_score = parse_base_score(&params.base_score)
            .ok_or_else(|| malformed(format!("invalid base_score '{}'", params.base_score)))?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(malformed(format!(
                "base_score {base_score} is not a probability"
            )));
        }

        if model.tree_info.iter().any(|&group| group != 0) {
            return Err(malformed("trees belong to more than one output group".to_string()));
        }

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| {
                Tree::from_json(tree, num_feature).map_err(|e| format!("tree {i}: {e}"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(malformed)?;

        let round_offsets = match model.iteration_indptr {
            Some(indptr) => {
                let valid = indptr.first() == Some(&0)
                    && indptr.last() == Some(&trees.len())
                    && indptr.windows(2).all(|w| w[0] <= w[1]);
                if !valid {
                    return Err(malformed(
                        "iteration_indptr does not cover the trees".to_string(),
                    ));
                }
                indptr
            }
            None => {
                let per_round: usize = model
                    .gbtree_model_param
                    .get("num_parallel_tree")
                    .and_then(|s| s.trim().parse().ok())
                    .unwrap_or(1)
                    .max(1);
                if trees.len() % per_round != 0 {
                    return Err(malformed(format!(
                        "{} trees do not divide into rounds of {per_round}",
                        trees.len()
                    )));
                }
                (0..=trees.len()).step_by(per_round).collect()
            }
        };

        let best_iteration = match learner.attributes.get("best_iteration") {
            Some(s) => Some(
                s.trim()
                    .parse::<u32>()
                    .map_err(|_| malformed(format!("invalid best_iteration '{s}'")))?,
            ),
            None => None,
        };

        let num_rounds = round_offsets.len() - 1;
        if let Some(best) = best_iteration {
            if best as usize >= num_rounds {
                return Err(malformed(format!(
                    "best_iteration {best} is past the last of {num_rounds} rounds"
                )));
            }
        }

        let feature_names = if learner.feature_names.is_empty() {
            None
        } else if learner.feature_names.len() != num_feature {
            return Err(malformed(format!(
                "{} feature names for {num_feature} features",
                learner.feature_names.len()
            )));
        } else {
            Some(learner.feature_names)
        };

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "xgboost".to_string());

        Ok(Self {
            name,
            trees,
            round_offsets,
            base_margin: logit(base_score),
            num_feature,
            feature_names,
            best_iteration,
        })
    }

    /// Number of boosting rounds.
    pub fn num_rounds(&self) -> u32 {
        (self.round_offsets.len() - 1) as u32
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Early-stopping round recorded at training time.
    pub fn best_iteration(&self) -> Option<u32> {
        self.best_iteration
    }

    fn tree_range(&self, rounds: Option<Range<u32>>) -> Result<Range<usize>, ModelInvocationError> {
        let Some(rounds) = rounds else {
            return Ok(0..self.trees.len());
        };
        if rounds.end > self.num_rounds() {
            return Err(ModelInvocationError::IterationRangeOutOfBounds {
                end: rounds.end,
                rounds: self.num_rounds(),
            });
        }
        let start = rounds.start.min(rounds.end) as usize;
        Ok(self.round_offsets[start]..self.round_offsets[rounds.end as usize])
    }

    fn margin(&self, row: &[f32], trees: Range<usize>) -> f32 {
        self.trees[trees]
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(row))
    }
}

impl Scorer for TreeBooster {
    fn name(&self) -> &str {
        &self.name
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.num_feature)
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(
        &self,
        input: &InputMatrix,
        rounds: Option<Range<u32>>,
    ) -> Result<Vec<f32>, ModelInvocationError> {
        let trees = self.tree_range(rounds)?;
        (0..input.rows())
            .map(|i| {
                let row = input.row(i).ok_or(ModelInvocationError::EmptyOutput)?;
                Ok(sigmoid(self.margin(row, trees.clone())))
            })
            .collect()
    }
}

/// `base_score` is written as `"5E-1"` or, in newer releases, `"[5E-1]"`.
fn parse_base_score(raw: &str) -> Option<f32> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

fn logit(p: f32) -> f32 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::feature_extractor::{FeatureMapper, FEATURE_WIDTH};
    use crate::types::transaction::{EmailMatch, RawInput};

    /// Three rounds of stumps over a 20-column input:
    /// round 0 splits on amount (slot 0) at 1000,
    /// round 1 splits on email match (slot 6) at 0.5, missing goes right,
    /// round 2 adds a constant.
    pub(crate) fn stump_model_json(best_iteration: Option<u32>) -> String {
        let attributes = match best_iteration {
            Some(best) => format!(r#"{{"best_iteration": "{best}", "best_score": "0.1"}}"#),
            None => "{}".to_string(),
        };
        let names: Vec<String> = (0..FEATURE_WIDTH).map(|i| format!("\"feature_{i}\"")).collect();
        format!(
            r#"{{
  "learner": {{
    "attributes": {attributes},
    "feature_names": [{names}],
    "feature_types": [],
    "gradient_booster": {{
      "name": "gbtree",
      "model": {{
        "gbtree_model_param": {{"num_parallel_tree": "1", "num_trees": "3"}},
        "iteration_indptr": [0, 1, 2, 3],
        "tree_info": [0, 0, 0],
        "trees": [
          {{
            "id": 0,
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [0, 0, 0],
            "split_conditions": [1000.0, -1.0, 1.0],
            "default_left": [1, 0, 0],
            "split_type": [0, 0, 0]
          }},
          {{
            "id": 1,
            "left_children": [1, -1, -1],
            "right_children": [2, -1, -1],
            "split_indices": [6, 0, 0],
            "split_conditions": [0.5, 0.5, -0.5],
            "default_left": [false, false, false],
            "split_type": [0, 0, 0]
          }},
          {{
            "id": 2,
            "left_children": [-1],
            "right_children": [-1],
            "split_indices": [0],
            "split_conditions": [2.0],
            "default_left": [0],
            "split_type": [0]
          }}
        ]
      }}
    }},
    "learner_model_param": {{"base_score": "5E-1", "num_class": "0", "num_feature": "20", "num_target": "1"}},
    "objective": {{"name": "binary:logistic", "reg_loss_param": {{"scale_pos_weight": "1"}}}}
  }},
  "version": [2, 0, 3]
}}"#,
            names = names.join(", ")
        )
    }

    fn booster(best_iteration: Option<u32>) -> TreeBooster {
        TreeBooster::from_slice(
            stump_model_json(best_iteration).as_bytes(),
            Path::new("xgb_fraud.json"),
        )
        .unwrap()
    }

    fn row(amount: f64, email_match: EmailMatch) -> InputMatrix {
        let mapper = FeatureMapper::new().unwrap();
        let raw = RawInput {
            amount,
            email_match,
            ..RawInput::default()
        };
        InputMatrix::from_vector(&mapper.map(&raw))
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_loads_model_metadata() {
        let booster = booster(Some(1));
        assert_eq!(booster.num_rounds(), 3);
        assert_eq!(booster.num_trees(), 3);
        assert_eq!(booster.best_iteration(), Some(1));
        assert_eq!(booster.input_width(), Some(FEATURE_WIDTH));
        assert_eq!(booster.feature_names().map(|n| n.len()), Some(FEATURE_WIDTH));
        assert_eq!(booster.name(), "xgb_fraud.json");
    }

    #[test]
    fn test_full_ensemble_prediction() {
        let booster = booster(None);

        // amount < 1000 → -1, email flag 0 → +0.5, constant +2 → margin 1.5
        let p = booster.predict(&row(50.0, EmailMatch::No), None).unwrap();
        assert!(approx(p[0], sigmoid(1.5)));

        // amount ≥ 1000 → +1, email flag 1 → -0.5, constant +2 → margin 2.5
        let p = booster.predict(&row(5000.0, EmailMatch::Yes), None).unwrap();
        assert!(approx(p[0], sigmoid(2.5)));
    }

    #[test]
    fn test_iteration_range_limits_rounds() {
        let booster = booster(Some(0));

        let p = booster.predict(&row(50.0, EmailMatch::No), Some(0..1)).unwrap();
        assert!(approx(p[0], sigmoid(-1.0)));

        let p = booster.predict(&row(50.0, EmailMatch::No), Some(0..2)).unwrap();
        assert!(approx(p[0], sigmoid(-0.5)));

        let p = booster.predict(&row(50.0, EmailMatch::No), Some(0..3)).unwrap();
        assert!(approx(p[0], sigmoid(1.5)));
    }

    #[test]
    fn test_iteration_range_past_end_is_rejected() {
        let booster = booster(None);
        let err = booster.predict(&row(50.0, EmailMatch::No), Some(0..4)).unwrap_err();
        assert_eq!(
            err,
            ModelInvocationError::IterationRangeOutOfBounds { end: 4, rounds: 3 }
        );
    }

    #[test]
    fn test_missing_value_follows_default_direction() {
        let tree = Tree {
            left: vec![1, -1, -1],
            right: vec![2, -1, -1],
            feature: vec![0, 0, 0],
            value: vec![0.5, -1.0, 1.0],
            default_left: vec![true, false, false],
        };
        assert_eq!(tree.leaf_value(&[f32::NAN]), -1.0);
        assert_eq!(tree.leaf_value(&[0.2]), -1.0);
        assert_eq!(tree.leaf_value(&[0.5]), 1.0);
    }

    #[test]
    fn test_rejects_unsupported_objective() {
        let json = stump_model_json(None).replace("binary:logistic", "multi:softprob");
        let err = TreeBooster::from_slice(json.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(matches!(err, ModelLoadError::UnsupportedObjective(o) if o == "multi:softprob"));
    }

    #[test]
    fn test_rejects_backward_child_pointer() {
        let json = stump_model_json(None).replacen(
            r#""left_children": [1, -1, -1]"#,
            r#""left_children": [0, -1, -1]"#,
            1,
        );
        let err = TreeBooster::from_slice(json.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(matches!(err, ModelLoadError::Malformed { .. }));
    }

    #[test]
    fn test_rejects_best_iteration_past_last_round() {
        let err = TreeBooster::from_slice(
            stump_model_json(Some(3)).as_bytes(),
            Path::new("m.json"),
        )
        .unwrap_err();
        assert!(matches!(err, ModelLoadError::Malformed { .. }));
    }

    #[test]
    fn test_rejects_truncated_feature_names() {
        let json = stump_model_json(None).replace(r#", "feature_19""#, "");
        let err = TreeBooster::from_slice(json.as_bytes(), Path::new("m.json")).unwrap_err();
        assert!(
            matches!(err, ModelLoadError::Malformed { ref reason, .. } if reason.contains("19 feature names"))
        );
    }

    #[test]
    fn test_rejects_invalid_json() {
        let err = TreeBooster::from_slice(b"not json", Path::new("m.json")).unwrap_err();
        assert!(matches!(err, ModelLoadError::Parse { .. }));
    }

    #[test]
    fn test_parse_base_score_formats() {
        assert_eq!(parse_base_score("5E-1"), Some(0.5));
        assert_eq!(parse_base_score("[2.5E-1]"), Some(0.25));
        assert_eq!(parse_base_score("abc"), None);
    }
}
