//! Removal backend contracts
//!
//! The dispatcher only knows these two seams. The local model and the
//! remote API are plugged in behind them at start-up.

use crate::error::BackendError;
use async_trait::async_trait;
use image::DynamicImage;

/// Usage statistics returned verbatim by the remote API
pub type UsageStats = serde_json::Map<String, serde_json::Value>;

/// Locally resident background removal model
///
/// `remove` is synchronous and may be CPU bound; callers run it on the
/// blocking pool.
pub trait LocalRemover: Send + Sync {
    /// Remove the background, returning an image with a populated alpha channel
    ///
    /// # Errors
    /// - `BackendError::Removal` for model failures
    /// - `BackendError::Unexpected` for anything else
    fn remove(&self, image: DynamicImage) -> Result<DynamicImage, BackendError>;

    /// Short name used in logs
    fn name(&self) -> &str;
}

/// Remote processing API gated by a credential
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Remove the background using the remote service
    ///
    /// # Errors
    /// - `BackendError::Removal` for network, authorization or API failures
    /// - `BackendError::Unexpected` for malformed responses
    async fn remove(
        &self,
        image: DynamicImage,
        credential: &str,
    ) -> Result<DynamicImage, BackendError>;

    /// Look up usage statistics for a credential
    ///
    /// # Errors
    /// Any failure reaching or reading the usage endpoint
    async fn usage(&self, credential: &str) -> Result<UsageStats, BackendError>;
}
