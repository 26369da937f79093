//! Evaluation of a trained pipeline over held-out labeled data.
//!
//! Runs the scoring path (without top-K narrowing) over every sample and
//! aggregates multiclass log-loss, overall and per label. Used at training
//! time to gate whether a freshly trained artifact is acceptable; never part
//! of the request-serving path.

use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::dataset::LabeledImageSample;
use crate::predictor::ImageClassifier;
use crate::processors::arg_max;
use crate::utils::load_image;
use std::path::PathBuf;

// Probabilities are clamped away from zero so a confidently wrong
// prediction yields a large but finite loss.
const PROBABILITY_FLOOR: f64 = 1e-15;

/// Outcome for one evaluated sample.
#[derive(Debug, Clone)]
pub struct SamplePrediction {
    /// Path of the evaluated image.
    pub image_path: PathBuf,
    /// Ground-truth label.
    pub actual: String,
    /// Top-ranked predicted label.
    pub predicted: String,
    /// Raw score of the predicted label.
    pub score: f32,
}

/// Aggregate metrics over a held-out dataset.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    /// Mean multiclass log-loss over all samples.
    pub log_loss: f64,
    /// Mean log-loss per label, in vocabulary order, for labels that
    /// appear in the dataset.
    pub per_label_log_loss: Vec<(String, f64)>,
    /// Fraction of samples whose top-ranked label matches the truth.
    pub micro_accuracy: f64,
    /// Per-sample outcomes, in dataset order.
    pub predictions: Vec<SamplePrediction>,
}

/// Evaluates a classifier over labeled samples.
#[derive(Debug)]
pub struct Evaluator<'a> {
    classifier: &'a ImageClassifier,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator over the given classifier.
    pub fn new(classifier: &'a ImageClassifier) -> Self {
        Self { classifier }
    }

    /// Scores every sample and aggregates log-loss metrics.
    ///
    /// # Errors
    ///
    /// * `SchemaMismatch` if a sample's label is not in the classifier's
    ///   vocabulary.
    /// * `Decode` if a sample's image cannot be read.
    pub fn evaluate(&self, samples: &[LabeledImageSample]) -> ClassifyResult<EvaluationReport> {
        if samples.is_empty() {
            return Err(ClassifyError::invalid_input(
                "evaluation requires at least one sample",
            ));
        }

        let vocabulary = self.classifier.vocabulary();
        let num_labels = vocabulary.len();
        let mut loss_sum = 0.0f64;
        let mut label_loss_sums = vec![0.0f64; num_labels];
        let mut label_counts = vec![0usize; num_labels];
        let mut correct = 0usize;
        let mut predictions = Vec::with_capacity(samples.len());

        for sample in samples {
            let actual_idx = vocabulary.index_of(&sample.label).ok_or_else(|| {
                ClassifyError::schema_mismatch(format!(
                    "evaluation label '{}' is not in the trained vocabulary",
                    sample.label
                ))
            })?;

            let image = load_image(&sample.image_path)?;
            let scores = self.classifier.score_image(&image)?;
            let raw: Vec<f32> = scores.iter().copied().collect();
            let probabilities = softmax(&raw);

            let p_true = probabilities[actual_idx].max(PROBABILITY_FLOOR);
            let loss = -p_true.ln();
            loss_sum += loss;
            label_loss_sums[actual_idx] += loss;
            label_counts[actual_idx] += 1;

            // arg_max cannot fail here: the vocabulary is non-empty.
            let predicted_idx = arg_max(&raw).unwrap_or(0);
            if predicted_idx == actual_idx {
                correct += 1;
            }
            predictions.push(SamplePrediction {
                image_path: sample.image_path.clone(),
                actual: sample.label.clone(),
                predicted: vocabulary
                    .get(predicted_idx)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("label_{predicted_idx}")),
                score: raw[predicted_idx],
            });
        }

        let per_label_log_loss = vocabulary
            .iter()
            .enumerate()
            .filter(|&(idx, _)| label_counts[idx] > 0)
            .map(|(idx, label)| {
                (
                    label.to_string(),
                    label_loss_sums[idx] / label_counts[idx] as f64,
                )
            })
            .collect();

        let report = EvaluationReport {
            log_loss: loss_sum / samples.len() as f64,
            per_label_log_loss,
            micro_accuracy: correct as f64 / samples.len() as f64,
            predictions,
        };
        tracing::info!(
            "evaluated {} sample(s): log-loss {:.4}, accuracy {:.3}",
            samples.len(),
            report.log_loss,
            report.micro_accuracy
        );
        Ok(report)
    }
}

/// Numerically stable softmax in f64.
fn softmax(scores: &[f32]) -> Vec<f64> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max) as f64;
    let exps: Vec<f64> = scores.iter().map(|&s| (s as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
