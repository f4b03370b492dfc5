//! Segmentation mask produced by the local model

use super::preprocessing::Letterbox;
use crate::error::BackendError;
use image::{imageops::FilterType, GrayImage, ImageBuffer, Luma, RgbaImage};
use ndarray::Array4;

/// Single channel alpha mask at original image resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    data: Vec<u8>,
    dimensions: (u32, u32),
}

impl SegmentationMask {
    /// Build a mask from raw row-major alpha values
    ///
    /// # Errors
    /// `BackendError::Unexpected` when the data length does not match the dimensions
    pub fn new(data: Vec<u8>, dimensions: (u32, u32)) -> Result<Self, BackendError> {
        let expected = dimensions.0 as usize * dimensions.1 as usize;
        if data.len() != expected {
            return Err(BackendError::unexpected(format!(
                "Mask has {} values, expected {expected}",
                data.len()
            )));
        }
        Ok(Self { data, dimensions })
    }

    /// Map a `[1, 1, H, W]` model output back onto the original image
    ///
    /// The padded border added by the letterbox is cropped away before the
    /// mask is resized to the original dimensions.
    ///
    /// # Errors
    /// `BackendError::Unexpected` for a malformed output tensor
    pub fn from_tensor(
        tensor: &Array4<f32>,
        letterbox: &Letterbox,
        original_dimensions: (u32, u32),
    ) -> Result<Self, BackendError> {
        let shape = tensor.shape();
        if shape[0] != 1 || shape[1] != 1 {
            return Err(BackendError::unexpected(format!(
                "Invalid output tensor shape {shape:?}"
            )));
        }
        let (mask_height, mask_width) = (shape[2] as u32, shape[3] as u32);
        if mask_width != letterbox.target_size || mask_height != letterbox.target_size {
            return Err(BackendError::unexpected(format!(
                "Output mask is {mask_width}x{mask_height}, expected {0}x{0}",
                letterbox.target_size
            )));
        }

        let full: GrayImage = ImageBuffer::from_fn(mask_width, mask_height, |x, y| {
            let value = tensor[[0, 0, y as usize, x as usize]];
            Luma([(value.clamp(0.0, 1.0) * 255.0).round() as u8])
        });

        let (scaled_width, scaled_height) = letterbox.scaled_dimensions(original_dimensions);
        let cropped = image::imageops::crop_imm(
            &full,
            letterbox.offset_x,
            letterbox.offset_y,
            scaled_width,
            scaled_height,
        )
        .to_image();

        let (width, height) = original_dimensions;
        let resized = image::imageops::resize(&cropped, width, height, FilterType::Triangle);
        Self::new(resized.into_raw(), original_dimensions)
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Write the mask into the alpha channel of an RGBA image
    ///
    /// # Errors
    /// `BackendError::Unexpected` when image and mask sizes differ
    pub fn apply_to_image(&self, image: &mut RgbaImage) -> Result<(), BackendError> {
        if image.dimensions() != self.dimensions {
            return Err(BackendError::unexpected(
                "Image and mask dimensions do not match",
            ));
        }

        for (pixel, alpha) in image.pixels_mut().zip(&self.data) {
            pixel[3] = *alpha;
        }

        Ok(())
    }
}
