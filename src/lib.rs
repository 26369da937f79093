//! # PhotoTag
//!
//! A Rust library that classifies photographs into a fixed set of labels
//! using transfer learning: a frozen pretrained ONNX network produces a
//! fixed-length embedding per image, and a small maximum-entropy classifier
//! trained on a labeled dataset maps embeddings to labels.
//!
//! ## Features
//!
//! - Training pipeline from a tab-separated `<imagePath>\t<label>` dataset
//! - Frozen ONNX feature extraction via a named intermediate activation
//! - Maximum-entropy (multinomial logistic regression) head fit by L-BFGS
//! - Single-file model artifact with embedded label vocabulary
//! - Concurrent single-image inference with ranked top-K results
//! - Held-out evaluation with overall and per-label log-loss
//!
//! ## Modules
//!
//! * [`core`] - Errors, configuration, and the embedder capability trait
//! * [`dataset`] - Dataset file loading and the label vocabulary
//! * [`trainer`] - Maximum-entropy training and the L-BFGS optimizer
//! * [`artifact`] - Persisted model artifacts
//! * [`predictor`] - The inference engine
//! * [`eval`] - Held-out evaluation
//! * [`pipeline`] - Training orchestration
//! * [`processors`] - Image preprocessing utilities
//! * [`utils`] - Image loading helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use phototag::prelude::*;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Train a model and persist it.
//! let pipeline = TrainingPipeline::builder()
//!     .extractor(ExtractorConfig::inception("assets/inception/extractor.onnx"))
//!     .build()?;
//! let (artifact, report) = pipeline.train_and_evaluate(
//!     Path::new("assets/images/tags.tsv"),
//!     Path::new("assets/images/test-tags.tsv"),
//!     Some(Path::new("assets/images")),
//! )?;
//! println!("log-loss: {:.4}", report.log_loss);
//! artifact.save(Path::new("model.json"))?;
//!
//! // Serve predictions from the saved artifact.
//! let classifier = ImageClassifier::load(Path::new("model.json"))?;
//! let image_bytes = std::fs::read("photo.jpg")?;
//! let prediction = classifier.predict(&image_bytes)?;
//! println!("{}", prediction.predicted_label);
//! for entry in &prediction.top_k {
//!     println!("  {} = {}", entry.label, entry.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod core;
pub mod dataset;
pub mod eval;
pub mod pipeline;
pub mod predictor;
pub mod processors;
pub mod trainer;
pub mod utils;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use phototag::prelude::*;
/// ```
pub mod prelude {
    pub use crate::artifact::{ClassifierWeights, ModelArtifact};
    pub use crate::core::{
        ClassifyError, ClassifyResult, ExtractorConfig, ImageEmbedder, TrainerConfig,
    };
    pub use crate::dataset::{load_dataset, LabelVocabulary, LabeledImageSample};
    pub use crate::eval::{EvaluationReport, Evaluator};
    pub use crate::pipeline::TrainingPipeline;
    pub use crate::predictor::{ImageClassifier, Prediction, ScoredLabel};
}
