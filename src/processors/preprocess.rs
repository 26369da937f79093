//! Image preprocessing: resize to the extractor's input size, then normalize.

use crate::core::config::ExtractorConfig;
use crate::core::errors::ClassifyResult;
use crate::core::Tensor4D;
use crate::processors::NormalizeImage;
use image::imageops::FilterType;
use image::RgbImage;

/// Prepares decoded images for the feature extractor.
///
/// Combines a fixed-size resize with the extractor's normalization recipe.
/// Stateless between calls; safe to use from concurrent predictions.
#[derive(Debug)]
pub struct ImagePreprocessor {
    /// Target size as (height, width)
    input_shape: (u32, u32),
    /// Resampling filter
    filter: FilterType,
    /// Pixel normalizer
    normalize: NormalizeImage,
}

impl ImagePreprocessor {
    /// Creates a preprocessor from an extractor configuration.
    pub fn from_config(config: &ExtractorConfig) -> ClassifyResult<Self> {
        config.validate()?;
        let normalize = NormalizeImage::new(
            config.scale,
            &config.mean,
            &config.std,
            config.channel_order,
        )?;
        Ok(Self {
            input_shape: config.input_shape,
            filter: config.resize_filter.to_filter_type(),
            normalize,
        })
    }

    /// Returns the target input size as (height, width).
    pub fn input_shape(&self) -> (u32, u32) {
        self.input_shape
    }

    /// Preprocesses one image into a tensor with a batch dimension of 1.
    pub fn apply(&self, image: &RgbImage) -> ClassifyResult<Tensor4D> {
        self.apply_batch(std::slice::from_ref(image))
    }

    /// Preprocesses a batch of images into one tensor.
    pub fn apply_batch(&self, images: &[RgbImage]) -> ClassifyResult<Tensor4D> {
        let (height, width) = self.input_shape;
        let resized: Vec<RgbImage> = images
            .iter()
            .map(|img| {
                if img.dimensions() == (width, height) {
                    img.clone()
                } else {
                    image::imageops::resize(img, width, height, self.filter)
                }
            })
            .collect();
        self.normalize.normalize_batch_to(&resized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::ChannelOrder;

    fn preprocessor() -> ImagePreprocessor {
        let config = ExtractorConfig::inception("models/extractor.onnx");
        ImagePreprocessor::from_config(&config).unwrap()
    }

    #[test]
    fn test_output_shape_matches_config() {
        let pre = preprocessor();
        let img = RgbImage::from_pixel(64, 48, image::Rgb([117, 117, 117]));
        let tensor = pre.apply(&img).unwrap();
        // HWC layout with batch dimension of 1.
        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
    }

    #[test]
    fn test_uniform_image_normalizes_to_zero() {
        let pre = preprocessor();
        let img = RgbImage::from_pixel(10, 10, image::Rgb([117, 117, 117]));
        let tensor = pre.apply(&img).unwrap();
        assert!(tensor.iter().all(|&v| v.abs() < 1e-3));
    }

    #[test]
    fn test_batch_stacks_along_first_axis() {
        let pre = preprocessor();
        let imgs = vec![
            RgbImage::from_pixel(30, 30, image::Rgb([0, 0, 0])),
            RgbImage::from_pixel(50, 40, image::Rgb([255, 255, 255])),
        ];
        let tensor = pre.apply_batch(&imgs).unwrap();
        assert_eq!(tensor.shape(), &[2, 224, 224, 3]);
        assert!(tensor[[0, 0, 0, 0]] < tensor[[1, 0, 0, 0]]);
    }

    #[test]
    fn test_chw_order_is_respected() {
        let mut config = ExtractorConfig::inception("models/extractor.onnx");
        config.channel_order = ChannelOrder::CHW;
        config.input_shape = (32, 32);
        let pre = ImagePreprocessor::from_config(&config).unwrap();
        let img = RgbImage::from_pixel(32, 32, image::Rgb([0, 0, 0]));
        let tensor = pre.apply(&img).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }
}
