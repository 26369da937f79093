//! The inference engine: single-image prediction over a loaded artifact.
//!
//! An [`ImageClassifier`] is an explicit value owned by the serving layer
//! and injected wherever predictions are needed; there is no process-wide
//! model singleton. All prediction paths take `&self` and the classifier is
//! `Send + Sync`, so one instance serves concurrent requests. Swapping in a
//! retrained artifact is the caller's concern and must replace the whole
//! classifier, never mutate it in place.

use crate::artifact::{ClassifierWeights, ModelArtifact};
use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::core::{ImageEmbedder, OrtEmbedder, Tensor1D};
use crate::dataset::LabelVocabulary;
use crate::processors::top_k;
use crate::utils::{decode_image, load_image};
use image::RgbImage;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Number of shortlist entries returned by default.
pub const DEFAULT_TOP_K: usize = 3;

/// One label with its raw score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredLabel {
    /// The label string.
    pub label: String,
    /// Raw (pre-softmax) classifier score.
    pub score: f32,
}

/// The outcome of classifying one image.
///
/// Scores are raw pre-softmax activations: they rank labels within this
/// prediction but are not probabilities and are not comparable across
/// predictions. Every vocabulary entry always has a score.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// The top-ranked label.
    pub predicted_label: String,
    /// The K highest-scoring labels, descending; ties resolve in
    /// vocabulary order.
    pub top_k: Vec<ScoredLabel>,
    /// Score per vocabulary entry, in vocabulary order.
    pub scores: Vec<ScoredLabel>,
}

impl Prediction {
    /// Returns the score of a label, if it is in the vocabulary.
    pub fn score_for(&self, label: &str) -> Option<f32> {
        self.scores
            .iter()
            .find(|entry| entry.label == label)
            .map(|entry| entry.score)
    }
}

/// Classifies images against one loaded model artifact.
pub struct ImageClassifier {
    embedder: Arc<dyn ImageEmbedder>,
    vocabulary: LabelVocabulary,
    weights: ClassifierWeights,
    top_k: usize,
}

impl std::fmt::Debug for ImageClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageClassifier")
            .field("labels", &self.vocabulary.len())
            .field("dim", &self.weights.dim())
            .field("top_k", &self.top_k)
            .finish()
    }
}

impl ImageClassifier {
    /// Builds a classifier from a validated artifact, loading the ONNX
    /// extractor it names.
    pub fn from_artifact(artifact: ModelArtifact) -> ClassifyResult<Self> {
        artifact.validate()?;
        let embedder: Arc<dyn ImageEmbedder> =
            Arc::new(OrtEmbedder::from_config(&artifact.extractor)?);
        Self::from_parts(embedder, artifact.vocabulary, artifact.weights)
    }

    /// Loads an artifact file and builds a classifier from it.
    ///
    /// A missing, unreadable, or inconsistent file is a fatal error; no
    /// default model is ever substituted.
    pub fn load(path: &Path) -> ClassifyResult<Self> {
        Self::from_artifact(ModelArtifact::load(path)?)
    }

    /// Builds a classifier from an explicit embedder and classifier head.
    ///
    /// # Errors
    ///
    /// * `VocabularyMismatch` if labels and weight rows disagree.
    /// * `SchemaMismatch` if the embedder's dimension disagrees with the
    ///   weight width.
    pub fn from_parts(
        embedder: Arc<dyn ImageEmbedder>,
        vocabulary: LabelVocabulary,
        weights: ClassifierWeights,
    ) -> ClassifyResult<Self> {
        if vocabulary.is_empty() {
            return Err(ClassifyError::schema_mismatch(
                "cannot serve predictions with an empty vocabulary",
            ));
        }
        if vocabulary.len() != weights.num_labels() {
            return Err(ClassifyError::VocabularyMismatch {
                labels: vocabulary.len(),
                weight_rows: weights.num_labels(),
            });
        }
        if embedder.dim() != weights.dim() {
            return Err(ClassifyError::schema_mismatch(format!(
                "embedder produces {}-dimensional vectors but classifier weights are {} wide",
                embedder.dim(),
                weights.dim()
            )));
        }
        Ok(Self {
            embedder,
            vocabulary,
            weights,
            top_k: DEFAULT_TOP_K,
        })
    }

    /// Sets the shortlist length K (default 3).
    pub fn with_top_k(mut self, k: usize) -> ClassifyResult<Self> {
        if k == 0 {
            return Err(ClassifyError::config_error("top_k must be at least 1"));
        }
        self.top_k = k;
        Ok(self)
    }

    /// Returns the label vocabulary this classifier scores against.
    pub fn vocabulary(&self) -> &LabelVocabulary {
        &self.vocabulary
    }

    /// Classifies raw image bytes (any supported encoding).
    ///
    /// # Errors
    ///
    /// Returns `Decode` for undecodable bytes; the request fails and no
    /// prediction is produced.
    pub fn predict(&self, image_bytes: &[u8]) -> ClassifyResult<Prediction> {
        let image = decode_image(image_bytes)?;
        self.predict_image(&image)
    }

    /// Classifies an image file.
    pub fn predict_path(&self, path: &Path) -> ClassifyResult<Prediction> {
        let image = load_image(path)?;
        self.predict_image(&image)
    }

    /// Classifies an already-decoded image.
    pub fn predict_image(&self, image: &RgbImage) -> ClassifyResult<Prediction> {
        let scores = self.score_image(image)?;
        Ok(self.rank(&scores))
    }

    /// Computes the raw per-label scores for an image without ranking.
    ///
    /// The evaluator uses this to reach the full score vector.
    pub fn score_image(&self, image: &RgbImage) -> ClassifyResult<Tensor1D> {
        let embedding = self.embedder.embed(image)?;
        Ok(self.weights.score(&embedding))
    }

    fn rank(&self, scores: &Tensor1D) -> Prediction {
        let raw: Vec<f32> = scores.iter().copied().collect();
        let label_at = |idx: usize| {
            self.vocabulary
                .get(idx)
                .map(str::to_string)
                .unwrap_or_else(|| format!("label_{idx}"))
        };

        let top_k: Vec<ScoredLabel> = top_k(&raw, self.top_k)
            .into_iter()
            .map(|(idx, score)| ScoredLabel {
                label: label_at(idx),
                score,
            })
            .collect();
        let scores: Vec<ScoredLabel> = raw
            .iter()
            .enumerate()
            .map(|(idx, &score)| ScoredLabel {
                label: label_at(idx),
                score,
            })
            .collect();
        // top_k is non-empty: the vocabulary is non-empty and K >= 1.
        let predicted_label = top_k
            .first()
            .map(|entry| entry.label.clone())
            .unwrap_or_default();

        tracing::debug!(
            "predicted '{}' over {} labels",
            predicted_label,
            scores.len()
        );

        Prediction {
            predicted_label,
            top_k,
            scores,
        }
    }
}

/// Deterministic synthetic embedder used by tests across the crate: maps an
/// image to its mean channel intensities in [0, 1].
#[cfg(test)]
pub(crate) mod test_embedder {
    use super::*;
    use ndarray::Array2;

    #[derive(Debug)]
    pub(crate) struct MeanColorEmbedder;

    impl ImageEmbedder for MeanColorEmbedder {
        fn dim(&self) -> usize {
            3
        }

        fn embed_batch(&self, images: &[RgbImage]) -> ClassifyResult<Array2<f32>> {
            let mut out = Array2::zeros((images.len(), 3));
            for (i, img) in images.iter().enumerate() {
                let mut sums = [0.0f64; 3];
                for pixel in img.pixels() {
                    for c in 0..3 {
                        sums[c] += pixel[c] as f64;
                    }
                }
                let count = (img.width() * img.height()) as f64 * 255.0;
                for c in 0..3 {
                    out[[i, c]] = (sums[c] / count) as f32;
                }
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_embedder::MeanColorEmbedder;
    use super::*;
    use ndarray::{array, Array1, Array2};

    fn classifier() -> ImageClassifier {
        // Red-detector on row 0, blue-detector on row 1, green on row 2.
        let weights = ClassifierWeights::new(
            array![
                [4.0_f32, -1.0, -1.0],
                [-1.0, -1.0, 4.0],
                [-1.0, 4.0, -1.0]
            ],
            Array1::zeros(3),
        )
        .unwrap();
        let vocabulary = LabelVocabulary::from_labels(
            ["red".to_string(), "blue".to_string(), "green".to_string()],
        );
        ImageClassifier::from_parts(Arc::new(MeanColorEmbedder), vocabulary, weights).unwrap()
    }

    fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(8, 8, image::Rgb(rgb));
        let mut bytes = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
        bytes
    }

    #[test]
    fn test_predict_ranks_expected_label_first() {
        let prediction = classifier().predict(&png_bytes([250, 10, 10])).unwrap();
        assert_eq!(prediction.predicted_label, "red");
        assert_eq!(prediction.top_k[0].label, "red");
    }

    #[test]
    fn test_predicted_label_equals_top_of_shortlist() {
        let c = classifier();
        for rgb in [[200, 30, 10], [10, 20, 240], [5, 230, 40]] {
            let prediction = c.predict(&png_bytes(rgb)).unwrap();
            assert_eq!(prediction.predicted_label, prediction.top_k[0].label);
        }
    }

    #[test]
    fn test_top_k_length_and_ordering() {
        let c = classifier();
        let prediction = c.predict(&png_bytes([128, 128, 128])).unwrap();
        assert_eq!(prediction.top_k.len(), 3);
        for window in prediction.top_k.windows(2) {
            assert!(window[0].score >= window[1].score);
        }

        let c = classifier().with_top_k(2).unwrap();
        let prediction = c.predict(&png_bytes([128, 128, 128])).unwrap();
        assert_eq!(prediction.top_k.len(), 2);

        let c = classifier().with_top_k(10).unwrap();
        let prediction = c.predict(&png_bytes([128, 128, 128])).unwrap();
        assert_eq!(prediction.top_k.len(), 3);
    }

    #[test]
    fn test_every_label_has_a_score() {
        let prediction = classifier().predict(&png_bytes([1, 2, 3])).unwrap();
        assert_eq!(prediction.scores.len(), 3);
        assert!(prediction.score_for("red").is_some());
        assert!(prediction.score_for("blue").is_some());
        assert!(prediction.score_for("green").is_some());
        assert!(prediction.score_for("yellow").is_none());
    }

    #[test]
    fn test_malformed_bytes_raise_decode_error() {
        let err = classifier().predict(&[0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ClassifyError::Decode(_)));

        let mut truncated = png_bytes([50, 50, 50]);
        truncated.truncate(truncated.len() / 3);
        assert!(matches!(
            classifier().predict(&truncated),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn test_vocabulary_weight_mismatch_refused() {
        let weights =
            ClassifierWeights::new(array![[1.0_f32, 0.0, 0.0], [0.0, 1.0, 0.0]], Array1::zeros(2))
                .unwrap();
        let vocabulary = LabelVocabulary::from_labels(
            ["a".to_string(), "b".to_string(), "c".to_string()],
        );
        let err =
            ImageClassifier::from_parts(Arc::new(MeanColorEmbedder), vocabulary, weights)
                .unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::VocabularyMismatch {
                labels: 3,
                weight_rows: 2
            }
        ));
    }

    #[test]
    fn test_embedder_dim_mismatch_refused() {
        let weights = ClassifierWeights::new(Array2::zeros((2, 7)), Array1::zeros(2)).unwrap();
        let vocabulary =
            LabelVocabulary::from_labels(["a".to_string(), "b".to_string()]);
        assert!(matches!(
            ImageClassifier::from_parts(Arc::new(MeanColorEmbedder), vocabulary, weights),
            Err(ClassifyError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        assert!(classifier().with_top_k(0).is_err());
    }

    #[test]
    fn test_concurrent_predictions_share_one_classifier() {
        let c = Arc::new(classifier());
        let mut handles = Vec::new();
        for rgb in [[240u8, 10, 10], [10, 10, 240], [10, 240, 10], [240, 10, 10]] {
            let c = Arc::clone(&c);
            handles.push(std::thread::spawn(move || {
                c.predict(&png_bytes(rgb)).unwrap().predicted_label
            }));
        }
        let labels: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(labels, vec!["red", "blue", "green", "red"]);
    }
}
