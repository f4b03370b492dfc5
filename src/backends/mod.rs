//! Backend implementations behind the removal contracts
//!
//! - Tract backend (pure Rust ONNX inference, local model)
//! - Studio API client (remote processing with a caller credential)
//! - Unavailable local remover used when no model is configured

#[cfg(feature = "tract")]
pub mod tract;

pub mod studio;

#[cfg(feature = "tract")]
pub use self::tract::TractRemover;

pub use self::studio::StudioApiClient;

use crate::{config::ServiceConfig, error::BackendError, inference::LocalRemover};
use image::DynamicImage;
use std::sync::Arc;

/// Local remover that rejects every request
///
/// Keeps the remote path usable when the server runs without a model.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableLocalRemover;

impl LocalRemover for UnavailableLocalRemover {
    fn remove(&self, _image: DynamicImage) -> Result<DynamicImage, BackendError> {
        Err(BackendError::removal(
            "Local model is not configured; start the server with --model-path or supply an api_key",
        ))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Build the local remover for a configuration
///
/// Falls back to [`UnavailableLocalRemover`] when no model path is set.
///
/// # Errors
/// Model loading failures when a path is configured
pub fn local_from_config(config: &ServiceConfig) -> crate::Result<Arc<dyn LocalRemover>> {
    match &config.model_path {
        #[cfg(feature = "tract")]
        Some(path) => {
            let remover = TractRemover::from_file(path, config.preprocessing.clone())?;
            Ok(Arc::new(remover))
        },
        #[cfg(not(feature = "tract"))]
        Some(path) => Err(crate::BgRemovalError::invalid_config(format!(
            "model {} requires the 'tract' feature",
            path.display()
        ))),
        None => {
            log::warn!("No local model configured; only api_key requests can be served");
            Ok(Arc::new(UnavailableLocalRemover))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_remover_reports_removal_error() {
        let err = UnavailableLocalRemover
            .remove(DynamicImage::new_rgb8(1, 1))
            .unwrap_err();
        assert!(matches!(err, BackendError::Removal(ref m) if m.contains("--model-path")));
    }

    #[test]
    fn test_no_model_path_uses_unavailable_remover() {
        let config = ServiceConfig::default();
        let local = local_from_config(&config).unwrap();
        assert_eq!(local.name(), "unavailable");
    }
}
