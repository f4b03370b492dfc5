//! Tensor plumbing for the local model

pub mod mask;
pub mod preprocessing;

pub use mask::SegmentationMask;
pub use preprocessing::{ImagePreprocessor, Letterbox};
