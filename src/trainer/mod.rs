//! Maximum-entropy classifier training.
//!
//! Fits a multinomial logistic-regression head over fixed image embeddings:
//! multiclass cross-entropy objective with L2 regularization on the weights,
//! minimized by L-BFGS. Weights start at zero and the problem is convex, so
//! a fixed dataset and configuration always reproduce the same classifier.

pub mod lbfgs;

use crate::artifact::ClassifierWeights;
use crate::core::config::TrainerConfig;
use crate::core::errors::{ClassifyError, ClassifyResult};
use lbfgs::{Lbfgs, LbfgsError};
use ndarray::{Array1, Array2, ArrayView2, Axis};

/// A fitted classifier head together with its optimization trace.
#[derive(Debug, Clone)]
pub struct FitOutcome {
    /// The fitted per-label weights and biases.
    pub weights: ClassifierWeights,
    /// Objective value after each accepted optimizer step.
    pub loss_history: Vec<f64>,
    /// Optimizer iterations spent.
    pub iterations: usize,
    /// Gradient norm at the solution.
    pub gradient_norm: f64,
}

/// Trains a maximum-entropy classifier over (embedding, class) pairs.
#[derive(Debug, Clone)]
pub struct MaxEntTrainer {
    config: TrainerConfig,
}

impl MaxEntTrainer {
    /// Creates a trainer with the given configuration.
    pub fn new(config: TrainerConfig) -> ClassifyResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Returns the trainer configuration.
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Fits the classifier.
    ///
    /// # Arguments
    ///
    /// * `embeddings` - One embedding per row, `(samples, dim)`
    /// * `classes` - Class index per sample, each `< num_classes`
    /// * `num_classes` - Number of score slots (vocabulary size)
    ///
    /// # Errors
    ///
    /// Returns `TrainingDivergence` if the optimizer fails to converge
    /// within its bounds; in that case no weights are produced.
    pub fn fit(
        &self,
        embeddings: ArrayView2<'_, f32>,
        classes: &[usize],
        num_classes: usize,
    ) -> ClassifyResult<FitOutcome> {
        let samples = embeddings.nrows();
        let dim = embeddings.ncols();
        if samples == 0 || dim == 0 {
            return Err(ClassifyError::invalid_input(
                "training requires at least one embedding with non-zero dimension",
            ));
        }
        if classes.len() != samples {
            return Err(ClassifyError::invalid_input(format!(
                "embedding count {} does not match class count {}",
                samples,
                classes.len()
            )));
        }
        if num_classes < 2 {
            return Err(ClassifyError::invalid_input(
                "training requires at least 2 distinct labels",
            ));
        }
        if let Some(&bad) = classes.iter().find(|&&c| c >= num_classes) {
            return Err(ClassifyError::invalid_input(format!(
                "class index {bad} is out of range for {num_classes} classes"
            )));
        }
        if embeddings.iter().any(|v| !v.is_finite()) {
            return Err(ClassifyError::invalid_input(
                "embeddings contain non-finite values",
            ));
        }

        tracing::info!(
            "fitting maximum-entropy classifier: {} samples, {} classes, dim {}",
            samples,
            num_classes,
            dim
        );

        let features = embeddings.mapv(|v| v as f64);
        let l2 = self.config.l2_weight;
        let objective = |params: &Array1<f64>| {
            cross_entropy_objective(params, &features, classes, num_classes, l2)
        };

        let optimizer = Lbfgs::new(
            self.config.history_size,
            self.config.tolerance,
            self.config.max_iterations,
        );
        // Zero start keeps the fit deterministic; the objective is convex.
        let x0 = Array1::zeros(num_classes * (dim + 1));
        let minimum = optimizer.minimize(objective, x0).map_err(|e| match e {
            LbfgsError::IterationLimit {
                iterations,
                gradient_norm,
            }
            | LbfgsError::LineSearchFailed {
                iteration: iterations,
                gradient_norm,
            } => ClassifyError::TrainingDivergence {
                iterations,
                gradient_norm,
            },
            LbfgsError::NonFinite { iteration } => ClassifyError::TrainingDivergence {
                iterations: iteration,
                gradient_norm: f64::NAN,
            },
        })?;

        tracing::info!(
            "classifier fit converged after {} iteration(s): loss {:.6e}, gradient norm {:.3e}",
            minimum.iterations,
            minimum.value,
            minimum.gradient_norm
        );

        let (weights, bias) = unpack_params(&minimum.x, num_classes, dim);
        Ok(FitOutcome {
            weights: ClassifierWeights::new(weights, bias)?,
            loss_history: minimum.loss_history,
            iterations: minimum.iterations,
            gradient_norm: minimum.gradient_norm,
        })
    }
}

/// Mean multiclass cross-entropy with L2 on weights (biases unpenalized),
/// and its gradient. Parameter layout: row-major `(num_classes, dim)`
/// weight block followed by `num_classes` biases.
fn cross_entropy_objective(
    params: &Array1<f64>,
    features: &Array2<f64>,
    classes: &[usize],
    num_classes: usize,
    l2: f64,
) -> (f64, Array1<f64>) {
    let samples = features.nrows();
    let dim = features.ncols();
    let (weights, bias) = split_params(params, num_classes, dim);

    // logits[(i, j)] = w_j . x_i + b_j
    let mut logits = features.dot(&weights.t());
    logits += &bias;

    let mut loss = 0.0;
    // After the loop, `logits` holds the softmax probabilities.
    for (i, mut row) in logits.axis_iter_mut(Axis(0)).enumerate() {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let log_sum = max + row.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
        loss += log_sum - row[classes[i]];
        row.mapv_inplace(|z| (z - log_sum).exp());
        row[classes[i]] -= 1.0;
    }
    let inv_n = 1.0 / samples as f64;
    loss *= inv_n;
    loss += 0.5 * l2 * weights.iter().map(|w| w * w).sum::<f64>();

    let mut weight_grad = logits.t().dot(features);
    weight_grad *= inv_n;
    weight_grad += &(l2 * &weights);
    let bias_grad = logits.sum_axis(Axis(0)) * inv_n;

    let mut gradient = Array1::zeros(num_classes * (dim + 1));
    for (dst, src) in gradient
        .slice_mut(ndarray::s![..num_classes * dim])
        .iter_mut()
        .zip(weight_grad.iter())
    {
        *dst = *src;
    }
    for (dst, src) in gradient
        .slice_mut(ndarray::s![num_classes * dim..])
        .iter_mut()
        .zip(bias_grad.iter())
    {
        *dst = *src;
    }
    (loss, gradient)
}

fn split_params(params: &Array1<f64>, num_classes: usize, dim: usize) -> (Array2<f64>, Array1<f64>) {
    let weights = Array2::from_shape_fn((num_classes, dim), |(j, d)| params[j * dim + d]);
    let bias = Array1::from_shape_fn(num_classes, |j| params[num_classes * dim + j]);
    (weights, bias)
}

fn unpack_params(
    params: &Array1<f64>,
    num_classes: usize,
    dim: usize,
) -> (Array2<f32>, Array1<f32>) {
    let (weights, bias) = split_params(params, num_classes, dim);
    (weights.mapv(|v| v as f32), bias.mapv(|v| v as f32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable_dataset() -> (Array2<f32>, Vec<usize>) {
        // Class 0 clusters around (1, 0); class 1 around (0, 1).
        let embeddings = array![
            [1.0_f32, 0.1],
            [0.9, 0.0],
            [1.1, 0.2],
            [0.8, -0.1],
            [0.0, 1.0],
            [0.1, 0.9],
            [-0.1, 1.1],
            [0.2, 0.8],
        ];
        let classes = vec![0, 0, 0, 0, 1, 1, 1, 1];
        (embeddings, classes)
    }

    #[test]
    fn test_fit_separates_two_clusters() {
        let (embeddings, classes) = separable_dataset();
        let trainer = MaxEntTrainer::new(TrainerConfig::default()).unwrap();
        let outcome = trainer.fit(embeddings.view(), &classes, 2).unwrap();

        let class0_scores = outcome.weights.score(&array![1.0_f32, 0.0]);
        assert!(class0_scores[0] > class0_scores[1]);
        let class1_scores = outcome.weights.score(&array![0.0_f32, 1.0]);
        assert!(class1_scores[1] > class1_scores[0]);
    }

    #[test]
    fn test_loss_decreases_monotonically() {
        let (embeddings, classes) = separable_dataset();
        let trainer = MaxEntTrainer::new(TrainerConfig::default()).unwrap();
        let outcome = trainer.fit(embeddings.view(), &classes, 2).unwrap();

        assert!(outcome.loss_history.len() > 1);
        for window in outcome.loss_history.windows(2) {
            assert!(window[1] <= window[0] + 1e-10);
        }
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (embeddings, classes) = separable_dataset();
        let trainer = MaxEntTrainer::new(TrainerConfig::default()).unwrap();
        let a = trainer.fit(embeddings.view(), &classes, 2).unwrap();
        let b = trainer.fit(embeddings.view(), &classes, 2).unwrap();
        assert_eq!(a.weights.weights(), b.weights.weights());
        assert_eq!(a.weights.bias(), b.weights.bias());
    }

    #[test]
    fn test_three_class_fit() {
        let embeddings = array![
            [1.0_f32, 0.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.0, 1.0, 0.0],
            [0.1, 0.9, 0.1],
            [0.0, 0.0, 1.0],
            [0.0, 0.1, 0.9],
        ];
        let classes = vec![0, 0, 1, 1, 2, 2];
        let trainer = MaxEntTrainer::new(TrainerConfig::default()).unwrap();
        let outcome = trainer.fit(embeddings.view(), &classes, 3).unwrap();

        for class in 0..3 {
            let mut probe = Array1::zeros(3);
            probe[class] = 1.0_f32;
            let scores = outcome.weights.score(&probe);
            let best = crate::processors::arg_max(scores.as_slice().unwrap_or(&[]));
            assert_eq!(best, Some(class));
        }
    }

    #[test]
    fn test_iteration_bound_surfaces_divergence() {
        let (embeddings, classes) = separable_dataset();
        let config = TrainerConfig {
            max_iterations: 1,
            tolerance: 1e-14,
            ..TrainerConfig::default()
        };
        let trainer = MaxEntTrainer::new(config).unwrap();
        let err = trainer.fit(embeddings.view(), &classes, 2).unwrap_err();
        assert!(matches!(err, ClassifyError::TrainingDivergence { .. }));
    }

    #[test]
    fn test_mismatched_inputs_rejected() {
        let (embeddings, _) = separable_dataset();
        let trainer = MaxEntTrainer::new(TrainerConfig::default()).unwrap();
        assert!(trainer.fit(embeddings.view(), &[0, 1], 2).is_err());
        let classes = vec![0, 0, 0, 0, 1, 1, 1, 5];
        assert!(trainer.fit(embeddings.view(), &classes, 2).is_err());
    }

    #[test]
    fn test_single_class_rejected() {
        let (embeddings, _) = separable_dataset();
        let classes = vec![0; 8];
        let trainer = MaxEntTrainer::new(TrainerConfig::default()).unwrap();
        assert!(trainer.fit(embeddings.view(), &classes, 1).is_err());
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let features = array![[0.5_f64, -1.0], [1.5, 0.25], [-0.75, 0.8]];
        let classes = [0usize, 1, 1];
        let params = Array1::from_vec(vec![0.1, -0.2, 0.3, 0.05, -0.1, 0.2]);
        let (_, gradient) = cross_entropy_objective(&params, &features, &classes, 2, 1e-3);

        let eps = 1e-6;
        for i in 0..params.len() {
            let mut lo = params.clone();
            let mut hi = params.clone();
            lo[i] -= eps;
            hi[i] += eps;
            let (value_lo, _) = cross_entropy_objective(&lo, &features, &classes, 2, 1e-3);
            let (value_hi, _) = cross_entropy_objective(&hi, &features, &classes, 2, 1e-3);
            let numeric = (value_hi - value_lo) / (2.0 * eps);
            assert!(
                (gradient[i] - numeric).abs() < 1e-6,
                "gradient component {i}: analytic {} vs numeric {}",
                gradient[i],
                numeric
            );
        }
    }
}
