//! Capability traits for the classification pipeline.

use crate::core::errors::ClassifyResult;
use image::RgbImage;
use ndarray::{Array1, Array2};

/// Produces fixed-length embeddings from decoded images.
///
/// Implementations wrap a frozen pretrained network: loaded once, immutable,
/// and deterministic, so the same image always yields the same embedding. The
/// trainer and the inference engine depend only on this trait, so the
/// concrete network can be swapped without touching either.
pub trait ImageEmbedder: Send + Sync {
    /// Length of the embedding vector this extractor produces.
    fn dim(&self) -> usize;

    /// Embeds a batch of images into a `(batch, dim)` matrix, one row per
    /// image, in input order.
    fn embed_batch(&self, images: &[RgbImage]) -> ClassifyResult<Array2<f32>>;

    /// Embeds a single image.
    fn embed(&self, image: &RgbImage) -> ClassifyResult<Array1<f32>> {
        let batch = self.embed_batch(std::slice::from_ref(image))?;
        Ok(batch.row(0).to_owned())
    }
}
