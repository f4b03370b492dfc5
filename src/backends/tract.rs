//! Tract backend for the local segmentation model
//!
//! Loads an ONNX model once at start-up and runs it on the CPU with Tract,
//! a pure Rust inference library. The model is expected to take a
//! `[1, 3, S, S]` normalized RGB tensor and produce a `[1, 1, S, S]` mask
//! with values in `0..=1`.

use crate::config::PreprocessingConfig;
use crate::error::{BackendError, BgRemovalError, Result};
use crate::inference::LocalRemover;
use crate::utils::{ImagePreprocessor, SegmentationMask};
use image::DynamicImage;
use instant::Instant;
use ndarray::Array4;
use std::path::Path;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Local remover backed by a Tract ONNX model
pub struct TractRemover {
    model: TractModel,
    preprocessing: PreprocessingConfig,
    name: String,
}

impl std::fmt::Debug for TractRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TractRemover")
            .field("name", &self.name)
            .field("preprocessing", &self.preprocessing)
            .finish_non_exhaustive()
    }
}

impl TractRemover {
    /// Load an ONNX model from disk
    ///
    /// # Errors
    /// - `Io` when the file cannot be read
    /// - `InvalidConfig` when the model cannot be parsed or optimized
    pub fn from_file<P: AsRef<Path>>(path: P, preprocessing: PreprocessingConfig) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned());
        Self::from_bytes(&data, name, preprocessing)
    }

    /// Load an ONNX model from memory
    ///
    /// # Errors
    /// `InvalidConfig` when the model cannot be parsed or optimized
    pub fn from_bytes(
        data: &[u8],
        name: impl Into<String>,
        preprocessing: PreprocessingConfig,
    ) -> Result<Self> {
        let name = name.into();
        let load_start = Instant::now();
        let size = preprocessing.target_size as usize;

        log::info!("Initializing Tract backend");
        #[allow(clippy::cast_precision_loss)]
        let size_mb = data.len() as f64 / (1024.0 * 1024.0);
        log::info!("Model: {name} ({size_mb:.2} MB), input {size}x{size}");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(data))
            .map_err(|e| BgRemovalError::invalid_config(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([1, 3, size, size]).into())
            .map_err(|e| BgRemovalError::invalid_config(format!("Failed to set model input: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::invalid_config(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| {
                BgRemovalError::invalid_config(format!("Failed to create runnable model: {e}"))
            })?;

        log::info!(
            "Tract backend ready in {}ms",
            load_start.elapsed().as_millis()
        );

        Ok(Self {
            model,
            preprocessing,
            name,
        })
    }

    fn infer(&self, input: &Array4<f32>) -> std::result::Result<Array4<f32>, BackendError> {
        log::debug!("Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let data = input
            .as_slice()
            .ok_or_else(|| BackendError::unexpected("Input tensor is not contiguous"))?;
        let input_tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| BackendError::unexpected(format!("Failed to build input tensor: {e}")))?;

        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BackendError::removal(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::unexpected("No output tensor found"))?
            .into_arc_tensor();

        let output_view = output_tensor.to_array_view::<f32>().map_err(|e| {
            BackendError::unexpected(format!("Failed to read output tensor: {e}"))
        })?;

        let shape = output_view.shape().to_vec();
        let &[batch, channels, height, width] = shape.as_slice() else {
            return Err(BackendError::unexpected(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };

        let output = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_view.iter().copied().collect(),
        )
        .map_err(|e| BackendError::unexpected(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output)
    }
}

impl LocalRemover for TractRemover {
    fn remove(&self, image: DynamicImage) -> std::result::Result<DynamicImage, BackendError> {
        let original_dimensions = (image.width(), image.height());
        let (input, letterbox) =
            ImagePreprocessor::preprocess_for_inference(&image, &self.preprocessing)?;

        let output = self.infer(&input)?;
        let mask = SegmentationMask::from_tensor(&output, &letterbox, original_dimensions)?;

        let mut rgba = image.into_rgba8();
        mask.apply_to_image(&mut rgba)?;
        Ok(DynamicImage::ImageRgba8(rgba))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_model_file_is_io_error() {
        let err = TractRemover::from_file(
            "/nonexistent/withoutbg/model.onnx",
            PreprocessingConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, BgRemovalError::Io(_)));
    }

    #[test]
    fn test_garbage_model_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"definitely not protobuf").unwrap();

        let err = TractRemover::from_file(file.path(), PreprocessingConfig::default()).unwrap_err();
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));
    }
}
