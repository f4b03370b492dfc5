//! Image preprocessing for the local segmentation model

use crate::{config::PreprocessingConfig, error::BackendError};
use image::{imageops::FilterType, DynamicImage, ImageBuffer, Rgb, RgbImage};
use ndarray::Array4;

/// Geometry of the letterbox applied during preprocessing
///
/// Needed to map the model's mask back onto the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor from original to model coordinates
    pub scale: f32,
    /// X offset of the resized image inside the canvas
    pub offset_x: u32,
    /// Y offset of the resized image inside the canvas
    pub offset_y: u32,
    /// Canvas edge length
    pub target_size: u32,
}

impl Letterbox {
    /// Compute the letterbox for an image of the given size
    #[must_use]
    pub fn fit(original_dimensions: (u32, u32), target_size: u32) -> Self {
        let (orig_width, orig_height) = original_dimensions;
        let target_size_f32 = target_size as f32;
        let scale = (target_size_f32 / orig_width.max(1) as f32)
            .min(target_size_f32 / orig_height.max(1) as f32);

        let (scaled_width, scaled_height) = Self::scaled(original_dimensions, scale, target_size);

        Self {
            scale,
            offset_x: (target_size - scaled_width) / 2,
            offset_y: (target_size - scaled_height) / 2,
            target_size,
        }
    }

    /// Size of the resized image inside the canvas
    #[must_use]
    pub fn scaled_dimensions(&self, original_dimensions: (u32, u32)) -> (u32, u32) {
        Self::scaled(original_dimensions, self.scale, self.target_size)
    }

    fn scaled(original_dimensions: (u32, u32), scale: f32, target_size: u32) -> (u32, u32) {
        let width = ((original_dimensions.0 as f32 * scale).round() as u32).clamp(1, target_size);
        let height = ((original_dimensions.1 as f32 * scale).round() as u32).clamp(1, target_size);
        (width, height)
    }
}

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Preprocess an image for model inference
    ///
    /// - RGB conversion
    /// - Aspect ratio preserving resize
    /// - Center padding to the square target size (white)
    /// - Normalization to an NCHW tensor
    ///
    /// # Errors
    /// `BackendError::Removal` for images with a zero dimension
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        config: &PreprocessingConfig,
    ) -> Result<(Array4<f32>, Letterbox), BackendError> {
        let rgb_image = image.to_rgb8();
        let original_dimensions = rgb_image.dimensions();
        if original_dimensions.0 == 0 || original_dimensions.1 == 0 {
            return Err(BackendError::removal("Image has zero width or height"));
        }

        let target_size = config.target_size;
        let letterbox = Letterbox::fit(original_dimensions, target_size);
        let (new_width, new_height) = letterbox.scaled_dimensions(original_dimensions);

        let resized = image::imageops::resize(&rgb_image, new_width, new_height, FilterType::Triangle);

        let mut canvas: RgbImage =
            ImageBuffer::from_pixel(target_size, target_size, Rgb([255, 255, 255]));
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        Ok((Self::canvas_to_tensor(&canvas, config), letterbox))
    }

    /// Convert canvas to normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (x, y, pixel) in canvas.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / 255.0;
                tensor[[0, channel, y as usize, x as usize]] = (value
                    - config.normalization_mean[channel])
                    / config.normalization_std[channel];
            }
        }

        tensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: 32,
            ..PreprocessingConfig::default()
        }
    }

    #[test]
    fn test_letterbox_wide_image() {
        let letterbox = Letterbox::fit((200, 100), 32);
        assert_eq!(letterbox.scaled_dimensions((200, 100)), (32, 16));
        assert_eq!(letterbox.offset_x, 0);
        assert_eq!(letterbox.offset_y, 8);
    }

    #[test]
    fn test_letterbox_upscales_small_image() {
        let letterbox = Letterbox::fit((8, 8), 32);
        assert!((letterbox.scale - 4.0).abs() < f32::EPSILON);
        assert_eq!(letterbox.offset_x, 0);
        assert_eq!(letterbox.offset_y, 0);
    }

    #[test]
    fn test_preprocess_shape_and_padding() {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([0, 0, 0])));
        let (tensor, letterbox) =
            ImagePreprocessor::preprocess_for_inference(&image, &small_config()).unwrap();

        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
        assert_eq!(letterbox.offset_y, 8);

        // Padding row is white: (1.0 - 0.5) / 1.0
        assert!((tensor[[0, 0, 0, 0]] - 0.5).abs() < 1e-6);
        // Image row is black: (0.0 - 0.5) / 1.0
        assert!((tensor[[0, 0, 16, 16]] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_rejects_empty_image() {
        let image = DynamicImage::new_rgb8(0, 10);
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &small_config()).is_err());
    }
}
