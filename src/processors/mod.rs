//! Image processing utilities for the classification pipeline.
//!
//! # Modules
//!
//! * `normalize` - Pixel normalization into extractor input tensors
//! * `preprocess` - Resize-and-normalize preprocessing
//! * `topk` - Top-k selection over per-label scores
//! * `types` - Shared preprocessing types

mod normalize;
mod preprocess;
pub mod topk;
pub mod types;

pub use normalize::NormalizeImage;
pub use preprocess::ImagePreprocessor;
pub use topk::{arg_max, top_k};
pub use types::{ChannelOrder, ResizeFilter};
