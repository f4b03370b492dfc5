//! Image decoding and encoding service
//!
//! Turns uploaded bytes into bitmaps and processed bitmaps back into bytes.
//! Format-specific quirks (alpha handling, quality) live here and in
//! [`OutputFormatHandler`].

use crate::{
    config::OutputFormat,
    error::{BgRemovalError, Result},
    services::OutputFormatHandler,
};
use image::DynamicImage;
use std::io::Cursor;

/// Largest width or height libwebp accepts
#[cfg(feature = "webp-support")]
const WEBP_MAX_DIMENSION: u32 = 16383;

/// Raw upload as received from the caller
#[derive(Debug, Clone)]
pub struct ImageBlob {
    /// Uploaded bytes
    pub data: Vec<u8>,
    /// Caller-declared MIME type
    pub content_type: Option<String>,
}

impl ImageBlob {
    pub fn new<S: Into<String>>(data: Vec<u8>, content_type: Option<S>) -> Self {
        Self {
            data,
            content_type: content_type.map(Into::into),
        }
    }

    /// Check that the declared content type is an image type
    ///
    /// # Errors
    /// `Validation` when the content type is missing or not `image/*`
    pub fn validate(&self) -> Result<()> {
        let is_image = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.get(..6))
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"));

        if is_image {
            Ok(())
        } else {
            Err(BgRemovalError::validation("File must be an image"))
        }
    }
}

/// Encoded output ready to be sent back
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Vec<u8>,
    pub format: OutputFormat,
    pub content_type: &'static str,
}

/// Service for decoding uploads and encoding results
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an uploaded blob into a bitmap
    ///
    /// The declared content type is checked before any decoding is
    /// attempted; the actual format is sniffed from the bytes.
    ///
    /// # Errors
    /// - `Validation` for a missing or non-image content type
    /// - `Decode` for corrupt or unsupported bytes
    ///
    /// # Examples
    /// ```rust
    /// use withoutbg_server::services::{ImageBlob, ImageIOService};
    ///
    /// let blob = ImageBlob::new(b"hello".to_vec(), Some("text/plain"));
    /// assert!(ImageIOService::decode(&blob).is_err());
    /// ```
    pub fn decode(blob: &ImageBlob) -> Result<DynamicImage> {
        blob.validate()?;
        Self::decode_bytes(&blob.data)
    }

    /// Decode raw bytes into a bitmap, sniffing the format
    ///
    /// # Errors
    /// `Decode` for empty, corrupt or unsupported bytes
    pub fn decode_bytes(data: &[u8]) -> Result<DynamicImage> {
        if data.is_empty() {
            return Err(BgRemovalError::decode("uploaded file is empty"));
        }

        image::load_from_memory(data).map_err(|e| BgRemovalError::decode(e.to_string()))
    }

    /// Encode a bitmap in the requested format
    ///
    /// `quality` (1-100) is applied to JPEG and WebP and ignored for PNG.
    ///
    /// # Errors
    /// `Encode` when the underlying encoder fails or the image is too large
    /// for the format
    pub fn encode(image: DynamicImage, format: OutputFormat, quality: u8) -> Result<EncodedImage> {
        let quality = quality.clamp(1, 100);
        let prepared = OutputFormatHandler::convert_format(image, format);

        let data = match format {
            OutputFormat::Png => {
                let mut buffer = Vec::new();
                prepared
                    .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)
                    .map_err(|e| BgRemovalError::encode(format.to_string(), e.to_string()))?;
                buffer
            },
            OutputFormat::Jpeg => {
                let mut buffer = Vec::new();
                let rgb_image = prepared.to_rgb8();
                let mut jpeg_encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
                jpeg_encoder
                    .encode_image(&rgb_image)
                    .map_err(|e| BgRemovalError::encode(format.to_string(), e.to_string()))?;
                buffer
            },
            OutputFormat::WebP => Self::encode_webp(&prepared, quality)?,
        };

        Ok(EncodedImage {
            data,
            format,
            content_type: OutputFormatHandler::content_type(format),
        })
    }

    #[cfg(feature = "webp-support")]
    fn encode_webp(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(BgRemovalError::encode("WEBP", "image has zero width or height"));
        }
        if width > WEBP_MAX_DIMENSION || height > WEBP_MAX_DIMENSION {
            return Err(BgRemovalError::encode(
                "WEBP",
                format!(
                    "{width}x{height} exceeds the {WEBP_MAX_DIMENSION} pixel limit per side"
                ),
            ));
        }

        let quality = f32::from(quality);
        let memory = if image.color().has_alpha() {
            let rgba_image = image.to_rgba8();
            webp::Encoder::from_rgba(rgba_image.as_raw(), width, height)
                .encode_simple(false, quality)
        } else {
            let rgb_image = image.to_rgb8();
            webp::Encoder::from_rgb(rgb_image.as_raw(), width, height)
                .encode_simple(false, quality)
        }
        .map_err(|e| BgRemovalError::encode("WEBP", format!("{e:?}")))?;

        Ok(memory.to_vec())
    }

    #[cfg(not(feature = "webp-support"))]
    fn encode_webp(_image: &DynamicImage, _quality: u8) -> Result<Vec<u8>> {
        Err(BgRemovalError::encode(
            "WEBP",
            "WebP support is not enabled in this build",
        ))
    }
}
