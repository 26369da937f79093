//! Types used in image preprocessing operations.

use image::imageops::FilterType;
use serde::{Deserialize, Serialize};

/// Specifies the order of channels in an image tensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChannelOrder {
    /// Channel, Height, Width order (common in PyTorch)
    CHW,
    /// Height, Width, Channel order (common in TensorFlow)
    HWC,
}

/// Resampling filter used when resizing images to the extractor's input size.
///
/// Mirrors the filters of `image::imageops::FilterType` so the choice can be
/// persisted inside a model artifact. The filter must match whatever the
/// extractor network was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ResizeFilter {
    /// Nearest-neighbor sampling
    Nearest,
    /// Bilinear (triangle) filter
    Bilinear,
    /// Catmull-Rom cubic filter
    CatmullRom,
    /// Gaussian filter
    Gaussian,
    /// Lanczos filter with window 3
    Lanczos3,
}

impl ResizeFilter {
    /// Converts to the `image` crate's filter type.
    pub fn to_filter_type(self) -> FilterType {
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Bilinear => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

impl Default for ResizeFilter {
    fn default() -> Self {
        ResizeFilter::Bilinear
    }
}
