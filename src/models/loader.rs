//! Model artifact loader

use crate::error::ModelLoadError;
use crate::models::booster::TreeBooster;
use crate::models::inference::{Model, Scorer};
use crate::models::onnx::OnnxScorer;
use std::path::Path;
use tracing::info;

/// Loads the scoring model once at startup.
#[derive(Debug, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load a model artifact, choosing the backend from the file extension.
    ///
    /// - `.json`: XGBoost booster; bounded to its best iteration when
    ///   training recorded one
    /// - `.onnx`: exported classifier, always invoked over the full model
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Model, ModelLoadError> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(ModelLoadError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        info!(path = %path.display(), "Loading model");

        let model = match extension.as_deref() {
            Some("json") => {
                let booster = TreeBooster::from_file(path)?;
                info!(
                    model = %booster.name(),
                    trees = booster.num_trees(),
                    rounds = booster.num_rounds(),
                    best_iteration = ?booster.best_iteration(),
                    "Booster loaded"
                );
                match booster.best_iteration() {
                    Some(best_iteration) => Model::Bounded {
                        booster: Box::new(booster),
                        best_iteration,
                    },
                    None => Model::Plain(Box::new(booster)),
                }
            }
            Some("onnx") => Model::Plain(Box::new(OnnxScorer::from_file(path)?)),
            _ => {
                return Err(ModelLoadError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booster::tests::stump_model_json;
    use std::io::Write;

    fn write_model(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_missing_file() {
        let err = ModelLoader::new().load("no_such_model.json").unwrap_err();
        assert!(matches!(err, ModelLoadError::NotFound { .. }));
        assert!(err.to_string().contains("no_such_model.json"));
    }

    #[test]
    fn test_booster_with_best_iteration_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "xgb_fraud.json", &stump_model_json(Some(1)));

        let model = ModelLoader::new().load(&path).unwrap();
        assert_eq!(model.best_iteration(), Some(1));
        assert_eq!(model.iteration_range(), Some(0..2));
    }

    #[test]
    fn test_booster_without_best_iteration_is_plain() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "xgb_fraud.json", &stump_model_json(None));

        let model = ModelLoader::new().load(&path).unwrap();
        assert!(matches!(model, Model::Plain(_)));
        assert_eq!(model.iteration_range(), None);
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "xgb_fraud.pkl", "binary");

        let err = ModelLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir, "xgb_fraud.json", "{\"learner\": ");

        let err = ModelLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, ModelLoadError::Parse { .. }));
    }
}
