//! Configuration types for the feature extractor and the classifier trainer.
//!
//! Both configs are plain serializable data. The extractor config travels
//! inside the persisted model artifact so a loaded model reconstructs the
//! exact preprocessing and extraction recipe it was trained with.

use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::processors::{ChannelOrder, ResizeFilter};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the pretrained feature extractor and its preprocessing.
///
/// The normalization fields describe the affine transform applied per channel
/// before inference: `value * (scale / std) - mean / std`. Channel order and
/// resize filter are correctness-critical; they must match the distribution
/// the extractor network was trained on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path to the frozen ONNX network.
    pub model_path: PathBuf,
    /// Name of the network's input tensor.
    pub input_name: String,
    /// Name of the intermediate activation used as the embedding output.
    ///
    /// Deliberately not the final classification layer; the mid-level
    /// features are what transfer to the new label set.
    pub output_name: String,
    /// Expected input size as (height, width).
    pub input_shape: (u32, u32),
    /// Length of the embedding vector the output layer produces.
    pub embedding_dim: usize,
    /// Scaling factor applied to raw pixel values.
    pub scale: f32,
    /// Per-channel mean offsets, in post-scale units (RGB order).
    pub mean: Vec<f32>,
    /// Per-channel standard deviations (RGB order).
    pub std: Vec<f32>,
    /// Channel layout of the input tensor.
    pub channel_order: ChannelOrder,
    /// Resampling filter used when resizing to `input_shape`.
    pub resize_filter: ResizeFilter,
    /// Number of pooled ONNX sessions for concurrent prediction.
    #[serde(default = "default_session_pool_size")]
    pub session_pool_size: usize,
}

fn default_session_pool_size() -> usize {
    1
}

impl ExtractorConfig {
    /// Creates a config for an Inception-style extractor.
    ///
    /// 224x224 input, interleaved channels, mean offset 117 with no further
    /// scaling, and the pre-softmax activation as the embedding layer.
    pub fn inception(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            input_name: "input".to_string(),
            output_name: "softmax2_pre_activation".to_string(),
            input_shape: (224, 224),
            embedding_dim: 2048,
            scale: 1.0,
            mean: vec![117.0, 117.0, 117.0],
            std: vec![1.0, 1.0, 1.0],
            channel_order: ChannelOrder::HWC,
            resize_filter: ResizeFilter::Bilinear,
            session_pool_size: 1,
        }
    }

    /// Validates the extractor configuration.
    pub fn validate(&self) -> ClassifyResult<()> {
        if self.model_path.as_os_str().is_empty() {
            return Err(ClassifyError::config_error("model_path must not be empty"));
        }
        if self.input_name.is_empty() || self.output_name.is_empty() {
            return Err(ClassifyError::config_error(
                "input_name and output_name must not be empty",
            ));
        }
        let (height, width) = self.input_shape;
        if height == 0 || width == 0 {
            return Err(ClassifyError::config_error(format!(
                "input_shape must be non-zero, got {}x{}",
                height, width
            )));
        }
        if self.embedding_dim == 0 {
            return Err(ClassifyError::config_error("embedding_dim must be > 0"));
        }
        if self.scale <= 0.0 {
            return Err(ClassifyError::config_error("scale must be greater than 0"));
        }
        if self.mean.len() != 3 || self.std.len() != 3 {
            return Err(ClassifyError::config_error(
                "mean and std must have exactly 3 elements for RGB",
            ));
        }
        for (i, &s) in self.std.iter().enumerate() {
            if s <= 0.0 {
                return Err(ClassifyError::config_error(format!(
                    "std at index {i} must be greater than 0, got {s}"
                )));
            }
        }
        if self.session_pool_size == 0 {
            return Err(ClassifyError::config_error(
                "session_pool_size must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Configuration for the maximum-entropy classifier trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Upper bound on optimizer iterations before the run is declared diverged.
    pub max_iterations: usize,
    /// Gradient-norm tolerance at which the fit is considered converged.
    pub tolerance: f64,
    /// L2 regularization weight applied to the classifier weights (not biases).
    pub l2_weight: f64,
    /// Number of curvature pairs the quasi-Newton optimizer remembers.
    pub history_size: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-5,
            l2_weight: 1e-6,
            history_size: 10,
        }
    }
}

impl TrainerConfig {
    /// Validates the trainer configuration.
    pub fn validate(&self) -> ClassifyResult<()> {
        if self.max_iterations == 0 {
            return Err(ClassifyError::config_error("max_iterations must be > 0"));
        }
        if !self.tolerance.is_finite() || self.tolerance <= 0.0 {
            return Err(ClassifyError::config_error(format!(
                "tolerance must be a positive finite number, got {}",
                self.tolerance
            )));
        }
        if !self.l2_weight.is_finite() || self.l2_weight < 0.0 {
            return Err(ClassifyError::config_error(format!(
                "l2_weight must be non-negative, got {}",
                self.l2_weight
            )));
        }
        if self.history_size == 0 {
            return Err(ClassifyError::config_error("history_size must be > 0"));
        }
        Ok(())
    }
}
