//! Utility functions for loading and decoding images.

use crate::core::errors::{ClassifyError, ClassifyResult};
use image::RgbImage;

/// Batches above this size are loaded in parallel.
const PARALLEL_LOAD_THRESHOLD: usize = 8;

/// Decodes raw image bytes (any supported encoding) into an RGB image.
///
/// # Errors
///
/// Returns `Decode` if the bytes are not a decodable image. No blank-image
/// substitute is ever produced.
pub fn decode_image(bytes: &[u8]) -> ClassifyResult<RgbImage> {
    let img = image::load_from_memory(bytes).map_err(ClassifyError::Decode)?;
    Ok(img.to_rgb8())
}

/// Loads an image from a file path and converts it to RGB.
pub fn load_image(path: &std::path::Path) -> ClassifyResult<RgbImage> {
    let img = image::open(path).map_err(ClassifyError::Decode)?;
    Ok(img.to_rgb8())
}

/// Loads a batch of images from file paths, in order.
///
/// Uses parallel loading when the batch is large enough to pay for it.
pub fn load_images_batch<P: AsRef<std::path::Path> + Send + Sync>(
    paths: &[P],
) -> ClassifyResult<Vec<RgbImage>> {
    if paths.len() > PARALLEL_LOAD_THRESHOLD {
        use rayon::prelude::*;
        paths.par_iter().map(|p| load_image(p.as_ref())).collect()
    } else {
        paths.iter().map(|p| load_image(p.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes(rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(4, 4, image::Rgb(rgb));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_decode_round_trip() {
        let decoded = decode_image(&png_bytes([1, 2, 3])).unwrap();
        assert_eq!(decoded.dimensions(), (4, 4));
        assert_eq!(decoded.get_pixel(0, 0).0, [1, 2, 3]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, ClassifyError::Decode(_)));
    }

    #[test]
    fn test_decode_rejects_truncated_image() {
        let mut bytes = png_bytes([9, 9, 9]);
        bytes.truncate(bytes.len() / 2);
        assert!(matches!(
            decode_image(&bytes),
            Err(ClassifyError::Decode(_))
        ));
    }

    #[test]
    fn test_load_images_batch_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3u8 {
            let path = dir.path().join(format!("{i}.png"));
            std::fs::write(&path, png_bytes([i, 0, 0])).unwrap();
            paths.push(path);
        }
        let images = load_images_batch(&paths).unwrap();
        assert_eq!(images.len(), 3);
        for (i, img) in images.iter().enumerate() {
            assert_eq!(img.get_pixel(0, 0).0[0], i as u8);
        }
    }
}
