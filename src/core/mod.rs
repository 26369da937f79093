//! The core module of the classification pipeline.
//!
//! This module contains the fundamental components of the pipeline:
//! - Error handling
//! - Configuration types
//! - The embedder capability trait and its ONNX-backed implementation
//!
//! It also provides re-exports of commonly used types for convenience.

pub mod config;
pub mod embedder;
pub mod errors;
pub mod traits;

pub use config::{ExtractorConfig, TrainerConfig};
pub use embedder::OrtEmbedder;
pub use errors::{ClassifyError, ClassifyResult, ProcessingStage};
pub use traits::ImageEmbedder;

/// A 1-dimensional f32 tensor.
pub type Tensor1D = ndarray::Array1<f32>;
/// A 2-dimensional f32 tensor.
pub type Tensor2D = ndarray::Array2<f32>;
/// A 4-dimensional f32 tensor.
pub type Tensor4D = ndarray::Array4<f32>;

/// Initializes the tracing subscriber for logging.
///
/// This function sets up the tracing subscriber with environment filter and
/// formatting layer. It's typically called at the start of an application to
/// enable logging.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
