//! Request dispatch pipeline
//!
//! This module provides the `BackgroundRemovalProcessor` that decides which
//! backend serves a request and runs the decode -> remove -> encode chain.
//! The HTTP layer owns one processor for the lifetime of the process.

use crate::{
    config::OutputFormat,
    error::{BackendError, BgRemovalError, Result},
    inference::{LocalRemover, RemoteBackend},
    services::{EncodedImage, ImageBlob, ImageIOService, OutputFormatHandler},
};
use image::DynamicImage;
use instant::Instant;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Which backend serves a request
///
/// Derived from the credential alone and recomputed for every request.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendMode {
    /// Locally resident model ("opensource")
    Local,
    /// Remote processing API ("api") with the caller's credential
    Remote(String),
}

impl BackendMode {
    /// Choose the backend for a credential
    ///
    /// A present, non-empty credential selects the remote API; anything else
    /// selects the local model.
    ///
    /// ```rust
    /// use withoutbg_server::BackendMode;
    ///
    /// assert_eq!(BackendMode::select(None), BackendMode::Local);
    /// assert_eq!(BackendMode::select(Some("")), BackendMode::Local);
    /// assert_eq!(
    ///     BackendMode::select(Some("key-123")),
    ///     BackendMode::Remote("key-123".to_string())
    /// );
    /// ```
    #[must_use]
    pub fn select(credential: Option<&str>) -> Self {
        match credential {
            Some(key) if !key.is_empty() => Self::Remote(key.to_string()),
            _ => Self::Local,
        }
    }

    /// Model name as exposed by the original service
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Local => "opensource",
            Self::Remote(_) => "api",
        }
    }
}

// Credentials never reach the logs
impl std::fmt::Debug for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Local => write!(f, "Local"),
            Self::Remote(_) => write!(f, "Remote(<redacted>)"),
        }
    }
}

/// A decoded image plus the caller's output options
#[derive(Clone)]
pub struct ProcessingRequest {
    pub image: DynamicImage,
    pub format: OutputFormat,
    /// 1-100, used by lossy formats only
    pub quality: u8,
    pub credential: Option<String>,
}

/// Dispatches removal to the local or remote backend
pub struct BackgroundRemovalProcessor {
    local: Arc<dyn LocalRemover>,
    remote: Arc<dyn RemoteBackend>,
}

impl BackgroundRemovalProcessor {
    /// Create a processor over the two backend contracts
    pub fn new(local: Arc<dyn LocalRemover>, remote: Arc<dyn RemoteBackend>) -> Self {
        Self { local, remote }
    }

    /// Remove the background from a decoded image
    ///
    /// The backend is chosen with [`BackendMode::select`]. The result is
    /// returned as produced by the backend, with no post-processing.
    ///
    /// # Errors
    /// - `Processing` carrying the backend's message for domain failures
    /// - `Internal` for unexpected backend failures or a failed worker
    #[instrument(
        skip(self, image, credential),
        fields(width = image.width(), height = image.height())
    )]
    pub async fn remove_background(
        &self,
        image: DynamicImage,
        credential: Option<&str>,
    ) -> Result<DynamicImage> {
        let mode = BackendMode::select(credential);
        let start = Instant::now();
        info!(backend = mode.label(), "Dispatching background removal");

        let outcome = match &mode {
            BackendMode::Local => {
                let local = Arc::clone(&self.local);
                debug!(model = local.name(), "Running local model on blocking pool");
                tokio::task::spawn_blocking(move || local.remove(image))
                    .await
                    .map_err(|e| {
                        BgRemovalError::internal(format!("local backend worker failed: {e}"))
                    })?
            },
            BackendMode::Remote(credential) => self.remote.remove(image, credential).await,
        };

        match outcome {
            Ok(result) => {
                info!(
                    backend = mode.label(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Background removed"
                );
                Ok(result)
            },
            Err(BackendError::Removal(message)) => {
                warn!(backend = mode.label(), error = %message, "Backend reported a failure");
                Err(BgRemovalError::Processing(message))
            },
            Err(BackendError::Unexpected(message)) => {
                warn!(backend = mode.label(), error = %message, "Backend failed unexpectedly");
                Err(BgRemovalError::Internal(message))
            },
        }
    }

    /// Remove the background and encode the result
    ///
    /// # Errors
    /// Any dispatch error, or `Encode` when serialization fails
    pub async fn process(&self, request: ProcessingRequest) -> Result<EncodedImage> {
        let ProcessingRequest {
            image,
            format,
            quality,
            credential,
        } = request;

        let result = self.remove_background(image, credential.as_deref()).await?;

        OutputFormatHandler::validate_for_background_removal(format);
        run_blocking("encode", move || ImageIOService::encode(result, format, quality)).await
    }

    /// Validate, decode, dispatch and encode a raw upload
    ///
    /// The content type is checked before the bytes are touched.
    ///
    /// # Errors
    /// `Validation` and `Decode` for bad uploads, then as [`Self::process`]
    pub async fn process_upload(
        &self,
        upload: ImageBlob,
        format: OutputFormat,
        quality: u8,
        credential: Option<String>,
    ) -> Result<EncodedImage> {
        upload.validate()?;
        debug!(bytes = upload.data.len(), "Decoding upload");
        let image = run_blocking("decode", move || ImageIOService::decode(&upload)).await?;

        self.process(ProcessingRequest {
            image,
            format,
            quality,
            credential,
        })
        .await
    }
}

/// Run CPU-bound codec work off the async executor
async fn run_blocking<T, F>(stage: &'static str, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BgRemovalError::internal(format!("{stage} worker failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::UsageStats;
    use async_trait::async_trait;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    struct FixedLocal {
        outcome: std::result::Result<(), BackendError>,
    }

    impl LocalRemover for FixedLocal {
        fn remove(&self, image: DynamicImage) -> std::result::Result<DynamicImage, BackendError> {
            self.outcome.clone()?;
            Ok(DynamicImage::ImageRgba8(image.to_rgba8()))
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[derive(Default)]
    struct RecordingRemote {
        credentials: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RemoteBackend for RecordingRemote {
        async fn remove(
            &self,
            image: DynamicImage,
            credential: &str,
        ) -> std::result::Result<DynamicImage, BackendError> {
            self.credentials.lock().unwrap().push(credential.to_string());
            Ok(image)
        }

        async fn usage(&self, _credential: &str) -> std::result::Result<UsageStats, BackendError> {
            Ok(UsageStats::new())
        }
    }

    fn red_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    fn processor(
        local: std::result::Result<(), BackendError>,
    ) -> (BackgroundRemovalProcessor, Arc<RecordingRemote>) {
        let remote = Arc::new(RecordingRemote::default());
        let processor = BackgroundRemovalProcessor::new(
            Arc::new(FixedLocal { outcome: local }),
            Arc::clone(&remote) as Arc<dyn RemoteBackend>,
        );
        (processor, remote)
    }

    #[test]
    fn test_backend_selection() {
        assert_eq!(BackendMode::select(None), BackendMode::Local);
        assert_eq!(BackendMode::select(Some("")), BackendMode::Local);
        assert_eq!(
            BackendMode::select(Some(" ")),
            BackendMode::Remote(" ".to_string())
        );
        assert_eq!(BackendMode::select(Some("abc")).label(), "api");
        assert_eq!(BackendMode::Local.label(), "opensource");
    }

    #[test]
    fn test_backend_mode_debug_redacts_credential() {
        let debug = format!("{:?}", BackendMode::select(Some("secret-key")));
        assert!(!debug.contains("secret-key"));
    }

    #[tokio::test]
    async fn test_local_path_skips_remote() {
        let (processor, remote) = processor(Ok(()));
        let result = processor.remove_background(red_image(), None).await.unwrap();

        assert_eq!(result.width(), 10);
        assert!(remote.credentials.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_path_forwards_credential() {
        let (processor, remote) = processor(Ok(()));
        processor
            .remove_background(red_image(), Some("key-123"))
            .await
            .unwrap();

        assert_eq!(*remote.credentials.lock().unwrap(), vec!["key-123".to_string()]);
    }

    #[tokio::test]
    async fn test_removal_failure_becomes_processing_error() {
        let (processor, _) = processor(Err(BackendError::removal("model exploded")));
        let err = processor.remove_background(red_image(), None).await.unwrap_err();

        assert!(matches!(err, BgRemovalError::Processing(ref m) if m == "model exploded"));
    }

    #[tokio::test]
    async fn test_unexpected_failure_becomes_internal_error() {
        let (processor, _) = processor(Err(BackendError::unexpected("bad tensor")));
        let err = processor.remove_background(red_image(), None).await.unwrap_err();

        assert!(matches!(err, BgRemovalError::Internal(_)));
        assert_eq!(err.to_string(), "Processing failed: bad tensor");
    }

    #[tokio::test]
    async fn test_process_upload_rejects_non_image_before_dispatch() {
        let (processor, remote) = processor(Ok(()));
        let upload = ImageBlob::new(b"%PDF-1.7".to_vec(), Some("application/pdf"));

        let err = processor
            .process_upload(upload, OutputFormat::Png, 95, Some("key".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, BgRemovalError::Validation(_)));
        assert!(remote.credentials.lock().unwrap().is_empty());
    }
}
