//! The persisted model artifact.
//!
//! A trained pipeline is snapshotted as one JSON file holding the extractor
//! configuration, the label vocabulary, and the fitted classifier weights.
//! The snapshot is immutable and versionless: retraining produces a new
//! artifact that replaces the old one wholesale. Loading validates the
//! artifact before it can reach the inference engine; a corrupt or
//! internally inconsistent file is a fatal, distinguishable error, never a
//! silent fallback to an untrained model.

use crate::core::config::ExtractorConfig;
use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::core::Tensor1D;
use crate::dataset::LabelVocabulary;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Linear classifier weights: one weight row and one bias per label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierWeights {
    weights: Array2<f32>,
    bias: Array1<f32>,
}

impl ClassifierWeights {
    /// Creates classifier weights, checking that the bias length matches the
    /// number of weight rows.
    pub fn new(weights: Array2<f32>, bias: Array1<f32>) -> ClassifyResult<Self> {
        if weights.nrows() != bias.len() {
            return Err(ClassifyError::invalid_input(format!(
                "classifier has {} weight rows but {} biases",
                weights.nrows(),
                bias.len()
            )));
        }
        Ok(Self { weights, bias })
    }

    /// Number of labels (weight rows).
    pub fn num_labels(&self) -> usize {
        self.weights.nrows()
    }

    /// Embedding dimensionality the weights apply to.
    pub fn dim(&self) -> usize {
        self.weights.ncols()
    }

    /// Returns the weight matrix.
    pub fn weights(&self) -> &Array2<f32> {
        &self.weights
    }

    /// Returns the bias vector.
    pub fn bias(&self) -> &Array1<f32> {
        &self.bias
    }

    /// Computes one raw score per label for an embedding.
    ///
    /// Scores are pre-softmax activations: comparable within one call,
    /// not across calls.
    pub fn score(&self, embedding: &Tensor1D) -> Tensor1D {
        self.weights.dot(embedding) + &self.bias
    }
}

/// The composed, persisted snapshot of a trained pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    /// Preprocessing and extraction recipe the classifier was trained with.
    pub extractor: ExtractorConfig,
    /// Ordered label vocabulary; position defines the score slot.
    pub vocabulary: LabelVocabulary,
    /// Fitted classifier weights.
    pub weights: ClassifierWeights,
}

impl ModelArtifact {
    /// Checks the artifact's internal consistency.
    ///
    /// # Errors
    ///
    /// * `VocabularyMismatch` if the label count disagrees with the weight
    ///   matrix row count.
    /// * `SchemaMismatch` if the vocabulary is empty or the weight width
    ///   disagrees with the extractor's embedding dimension.
    pub fn validate(&self) -> ClassifyResult<()> {
        self.extractor.validate()?;
        if self.vocabulary.is_empty() {
            return Err(ClassifyError::schema_mismatch(
                "artifact has an empty label vocabulary",
            ));
        }
        if self.vocabulary.len() != self.weights.num_labels() {
            return Err(ClassifyError::VocabularyMismatch {
                labels: self.vocabulary.len(),
                weight_rows: self.weights.num_labels(),
            });
        }
        if self.weights.dim() != self.extractor.embedding_dim {
            return Err(ClassifyError::schema_mismatch(format!(
                "classifier weights are {} wide but the extractor produces {}-dimensional embeddings",
                self.weights.dim(),
                self.extractor.embedding_dim
            )));
        }
        Ok(())
    }

    /// Writes the artifact to a single JSON file.
    pub fn save(&self, path: &Path) -> ClassifyResult<()> {
        self.validate()?;
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self).map_err(|e| {
            ClassifyError::schema_mismatch(format!(
                "failed to serialize model artifact to '{}': {e}",
                path.display()
            ))
        })?;
        tracing::info!(
            "saved model artifact with {} labels to '{}'",
            self.vocabulary.len(),
            path.display()
        );
        Ok(())
    }

    /// Reads and validates an artifact from a JSON file.
    ///
    /// # Errors
    ///
    /// * `Io` if the file is missing or unreadable.
    /// * `SchemaMismatch` if the file is not a valid artifact.
    /// * `VocabularyMismatch` if labels and weight rows disagree.
    pub fn load(path: &Path) -> ClassifyResult<Self> {
        let file = std::fs::File::open(path)?;
        let artifact: ModelArtifact =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                ClassifyError::schema_mismatch(format!(
                    "'{}' is not a valid model artifact: {e}",
                    path.display()
                ))
            })?;
        artifact.validate()?;
        tracing::info!(
            "loaded model artifact with {} labels from '{}'",
            artifact.vocabulary.len(),
            path.display()
        );
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn small_artifact() -> ModelArtifact {
        let mut extractor = ExtractorConfig::inception("models/extractor.onnx");
        extractor.embedding_dim = 3;
        ModelArtifact {
            extractor,
            vocabulary: LabelVocabulary::from_labels(["cat".to_string(), "dog".to_string()]),
            weights: ClassifierWeights::new(
                array![[0.5_f32, -0.25, 0.1], [-0.5, 0.25, -0.1]],
                array![0.05_f32, -0.05],
            )
            .unwrap(),
        }
    }

    #[test]
    fn test_score_applies_weights_and_bias() {
        let artifact = small_artifact();
        let scores = artifact.weights.score(&array![1.0_f32, 1.0, 1.0]);
        assert!((scores[0] - 0.4).abs() < 1e-6);
        assert!((scores[1] + 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_save_load_round_trip_reproduces_scores() {
        let artifact = small_artifact();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        artifact.save(&path).unwrap();

        let loaded = ModelArtifact::load(&path).unwrap();
        let embedding = array![0.3_f32, -1.2, 0.75];
        let before = artifact.weights.score(&embedding);
        let after = loaded.weights.score(&embedding);
        for (a, b) in before.iter().zip(after.iter()) {
            assert!((a - b).abs() <= 1e-5 * a.abs().max(1.0));
        }
        assert_eq!(loaded.vocabulary, artifact.vocabulary);
        assert_eq!(loaded.extractor, artifact.extractor);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ModelArtifact::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, ClassifyError::Io(_)));
    }

    #[test]
    fn test_load_garbage_file_is_schema_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"not json at all").unwrap();
        assert!(matches!(
            ModelArtifact::load(&path),
            Err(ClassifyError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_load_detects_vocabulary_mismatch() {
        let artifact = small_artifact();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        artifact.save(&path).unwrap();

        // Drop one vocabulary entry so 1 label faces 2 weight rows.
        let mut value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        value["vocabulary"] = serde_json::json!(["cat"]);
        std::fs::write(&path, serde_json::to_string(&value).unwrap()).unwrap();

        let err = ModelArtifact::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::VocabularyMismatch {
                labels: 1,
                weight_rows: 2
            }
        ));
    }

    #[test]
    fn test_validate_rejects_dim_disagreement() {
        let mut artifact = small_artifact();
        artifact.extractor.embedding_dim = 4;
        assert!(matches!(
            artifact.validate(),
            Err(ClassifyError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_weights_bias_length_checked() {
        assert!(ClassifierWeights::new(array![[1.0_f32, 2.0]], array![0.0_f32, 1.0]).is_err());
    }
}
