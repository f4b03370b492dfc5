//! Output format rules: alpha handling, extensions and MIME types

use crate::config::OutputFormat;
use image::{DynamicImage, Rgb, RgbImage};

/// Service for handling output format conversions
pub struct OutputFormatHandler;

impl OutputFormatHandler {
    /// Prepare an image for encoding in the specified output format
    ///
    /// JPEG cannot carry transparency: images with an alpha channel are
    /// composited onto an opaque white canvas, using alpha as the mixing
    /// mask. This is lossy for this format. PNG and WebP keep the image
    /// unchanged.
    ///
    /// # Examples
    /// ```rust
    /// use withoutbg_server::{services::OutputFormatHandler, OutputFormat};
    /// use image::{DynamicImage, Rgba, RgbaImage};
    ///
    /// let transparent = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 0]));
    /// let flattened = OutputFormatHandler::convert_format(
    ///     DynamicImage::ImageRgba8(transparent),
    ///     OutputFormat::Jpeg,
    /// );
    /// assert_eq!(flattened.to_rgb8().get_pixel(0, 0).0, [255, 255, 255]);
    /// ```
    #[must_use]
    pub fn convert_format(image: DynamicImage, format: OutputFormat) -> DynamicImage {
        match format {
            OutputFormat::Png | OutputFormat::WebP => image,
            OutputFormat::Jpeg => {
                if image.color().has_alpha() {
                    DynamicImage::ImageRgb8(Self::flatten_onto_white(&image))
                } else {
                    DynamicImage::ImageRgb8(image.to_rgb8())
                }
            },
        }
    }

    /// Composite an image with alpha onto an opaque white canvas
    #[must_use]
    pub fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
        let rgba_image = image.to_rgba8();
        let (width, height) = rgba_image.dimensions();
        let mut canvas = RgbImage::new(width, height);

        for (x, y, pixel) in rgba_image.enumerate_pixels() {
            let alpha = u16::from(pixel[3]);
            let blend = |channel: u8| -> u8 {
                let value = u16::from(channel) * alpha + 255 * (255 - alpha);
                // Rounded division by 255, always <= 255
                ((value + 127) / 255) as u8
            };
            canvas.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
        }

        canvas
    }

    /// Get the appropriate file extension for a given output format
    ///
    /// ```rust
    /// use withoutbg_server::{services::OutputFormatHandler, OutputFormat};
    ///
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Png), "png");
    /// assert_eq!(OutputFormatHandler::get_extension(OutputFormat::Jpeg), "jpg");
    /// ```
    #[must_use]
    pub fn get_extension(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpg",
            OutputFormat::WebP => "webp",
        }
    }

    /// MIME type advertised for a given output format
    #[must_use]
    pub fn content_type(format: OutputFormat) -> &'static str {
        match format {
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::WebP => "image/webp",
        }
    }

    /// Check if a format supports transparency (alpha channel)
    #[must_use]
    pub fn supports_transparency(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Png | OutputFormat::WebP => true,
            OutputFormat::Jpeg => false,
        }
    }

    /// Note in the debug log when a format will drop transparency
    pub fn validate_for_background_removal(format: OutputFormat) {
        if !Self::supports_transparency(format) {
            tracing::debug!(
                format = %format,
                "Output format does not support transparency, compositing onto white"
            );
        }
    }
}
