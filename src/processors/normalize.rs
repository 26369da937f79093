//! Pixel normalization for extractor input tensors.
//!
//! The extractor network expects pixel values shifted and scaled to match its
//! training distribution. Normalization is expressed as a per-channel affine
//! transform `value * alpha + beta` with `alpha = scale / std` and
//! `beta = -mean / std`, applied in either CHW or HWC layout.

use crate::core::errors::{ClassifyError, ClassifyResult};
use crate::core::Tensor4D;
use crate::processors::ChannelOrder;
use image::RgbImage;

/// Normalizes decoded RGB images into f32 tensors.
#[derive(Debug)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    beta: [f32; 3],
    /// Channel ordering of the produced tensor
    order: ChannelOrder,
}

impl NormalizeImage {
    /// Creates a new NormalizeImage instance.
    ///
    /// # Arguments
    ///
    /// * `scale` - Scaling factor applied to raw pixel values
    /// * `mean` - Per-channel mean offsets in post-scale units (RGB order)
    /// * `std` - Per-channel standard deviations (RGB order)
    /// * `order` - Channel ordering of the produced tensor
    ///
    /// # Errors
    ///
    /// Returns a configuration error if scale is not positive, mean or std
    /// don't have exactly 3 elements, or any std value is not positive.
    pub fn new(scale: f32, mean: &[f32], std: &[f32], order: ChannelOrder) -> ClassifyResult<Self> {
        if scale <= 0.0 {
            return Err(ClassifyError::config_error(
                "scale must be greater than 0",
            ));
        }
        if mean.len() != 3 || std.len() != 3 {
            return Err(ClassifyError::config_error(
                "mean and std must have exactly 3 elements for RGB",
            ));
        }
        for (i, &s) in std.iter().enumerate() {
            if s <= 0.0 {
                return Err(ClassifyError::config_error(format!(
                    "std at index {i} must be greater than 0, got {s}"
                )));
            }
        }

        let mut alpha = [0.0f32; 3];
        let mut beta = [0.0f32; 3];
        for c in 0..3 {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }
        for c in 0..3 {
            if !alpha[c].is_finite() || !beta[c].is_finite() {
                return Err(ClassifyError::config_error(format!(
                    "normalization coefficients at channel {c} are not finite"
                )));
            }
        }

        Ok(Self { alpha, beta, order })
    }

    /// Returns the channel ordering this normalizer produces.
    pub fn order(&self) -> ChannelOrder {
        self.order
    }

    /// Normalizes a single image into a 4D tensor with a batch dimension of 1.
    pub fn normalize_to(&self, img: &RgbImage) -> ClassifyResult<Tensor4D> {
        self.normalize_batch_to(std::slice::from_ref(img))
    }

    /// Normalizes a batch of equally-sized images into one 4D tensor.
    ///
    /// # Errors
    ///
    /// Returns an invalid-input error if the batch is empty or the images
    /// don't all share the same dimensions.
    pub fn normalize_batch_to(&self, imgs: &[RgbImage]) -> ClassifyResult<Tensor4D> {
        let batch_size = imgs.len();
        if batch_size == 0 {
            return Err(ClassifyError::invalid_input(
                "cannot normalize an empty image batch",
            ));
        }

        let (width, height) = imgs[0].dimensions();
        for (i, img) in imgs.iter().enumerate() {
            if img.dimensions() != (width, height) {
                let (w, h) = img.dimensions();
                return Err(ClassifyError::invalid_input(format!(
                    "all images in batch must share dimensions: image 0 is {width}x{height}, image {i} is {w}x{h}"
                )));
            }
        }

        let channels = 3usize;
        let (width, height) = (width as usize, height as usize);
        let img_size = channels * height * width;
        let mut data = vec![0.0f32; batch_size * img_size];

        for (batch_idx, img) in imgs.iter().enumerate() {
            let slice = &mut data[batch_idx * img_size..(batch_idx + 1) * img_size];
            match self.order {
                ChannelOrder::CHW => {
                    for (x, y, pixel) in img.enumerate_pixels() {
                        let (x, y) = (x as usize, y as usize);
                        for c in 0..channels {
                            slice[c * height * width + y * width + x] =
                                pixel[c] as f32 * self.alpha[c] + self.beta[c];
                        }
                    }
                }
                ChannelOrder::HWC => {
                    for (x, y, pixel) in img.enumerate_pixels() {
                        let (x, y) = (x as usize, y as usize);
                        for c in 0..channels {
                            slice[(y * width + x) * channels + c] =
                                pixel[c] as f32 * self.alpha[c] + self.beta[c];
                        }
                    }
                }
            }
        }

        let shape = match self.order {
            ChannelOrder::CHW => (batch_size, channels, height, width),
            ChannelOrder::HWC => (batch_size, height, width, channels),
        };
        ndarray::Array4::from_shape_vec(shape, data)
            .map_err(|e| ClassifyError::tensor_operation("batch normalization tensor", e))
    }
}
