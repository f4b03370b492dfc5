//! Usage statistics proxy for remote API callers

use crate::{
    error::{BgRemovalError, Result},
    inference::{RemoteBackend, UsageStats},
};
use std::sync::Arc;

/// Forwards usage lookups to the remote backend
pub struct UsageProxy {
    remote: Arc<dyn RemoteBackend>,
}

impl UsageProxy {
    pub fn new(remote: Arc<dyn RemoteBackend>) -> Self {
        Self { remote }
    }

    /// Fetch usage statistics for a credential, returned unchanged
    ///
    /// An empty credential fails immediately without contacting the
    /// remote service. There is no caching and no retry.
    ///
    /// # Errors
    /// `UsageQuery` for an empty credential or any remote failure
    pub async fn get_usage(&self, credential: &str) -> Result<UsageStats> {
        if credential.is_empty() {
            return Err(BgRemovalError::usage_query("API key is required"));
        }

        self.remote.usage(credential).await.map_err(|e| {
            tracing::warn!(error = %e, "Usage lookup failed");
            BgRemovalError::usage_query(e.to_string())
        })
    }
}
