//! Error types for the classification pipeline.
//!
//! This module defines the errors that can occur while building, training,
//! persisting, or serving a classification model, along with utility
//! constructors that attach context to them.

use thiserror::Error;

/// Enum representing different stages of processing in the pipeline.
///
/// This enum is used to identify which stage of the pipeline an error
/// occurred in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProcessingStage {
    /// Error occurred during tensor operations.
    TensorOperation,
    /// Error occurred during image normalization.
    Normalization,
    /// Error occurred during image resizing.
    Resize,
    /// Error occurred during classifier training.
    Training,
    /// Error occurred during evaluation.
    Evaluation,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::TensorOperation => write!(f, "tensor operation"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::Training => write!(f, "training"),
            ProcessingStage::Evaluation => write!(f, "evaluation"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Enum representing the errors that can occur in the classification pipeline.
///
/// Decode errors are per-request and recoverable by the caller; schema,
/// training, and vocabulary errors are fatal for the run that raised them.
#[derive(Error, Debug)]
pub enum ClassifyError {
    /// Image bytes or an image file could not be decoded.
    #[error("image decode")]
    Decode(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while running the feature extractor.
    #[error("embedding with model '{model}' failed: {context}")]
    Embedding {
        /// Name of the extractor model involved.
        model: String,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A dataset row or a persisted artifact does not match the expected shape.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// A message describing the mismatch.
        message: String,
    },

    /// The optimizer failed to reach convergence within its bounds.
    #[error(
        "training diverged: no convergence after {iterations} iterations (gradient norm {gradient_norm:e})"
    )]
    TrainingDivergence {
        /// Iterations spent before giving up.
        iterations: usize,
        /// Gradient norm at the point the run was abandoned.
        gradient_norm: f64,
    },

    /// A loaded artifact's label count disagrees with its weight matrix.
    #[error("vocabulary mismatch: {labels} labels but {weight_rows} weight rows")]
    VocabularyMismatch {
        /// Number of entries in the label vocabulary.
        labels: usize,
        /// Number of rows in the classifier weight matrix.
        weight_rows: usize,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from tensor operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for results produced by this crate.
pub type ClassifyResult<T> = Result<T, ClassifyError>;

impl ClassifyError {
    /// Creates a ClassifyError for tensor operations.
    pub fn tensor_operation(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::TensorOperation,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a ClassifyError for normalization operations.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind: ProcessingStage::Normalization,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a ClassifyError for training failures other than divergence.
    pub fn training(context: &str, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Processing {
            kind: ProcessingStage::Training,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a ClassifyError for a failed extractor run.
    pub fn embedding(
        model: &str,
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Embedding {
            model: model.to_string(),
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a ClassifyError for invalid input.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Creates a ClassifyError for configuration errors.
    pub fn config_error(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Creates a ClassifyError for malformed dataset rows or artifact files.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }
}

impl From<image::ImageError> for ClassifyError {
    fn from(error: image::ImageError) -> Self {
        Self::Decode(error)
    }
}

/// A plain-text error used when no richer source error is available.
#[derive(Debug)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    /// Creates a new SimpleError with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SimpleError {}
