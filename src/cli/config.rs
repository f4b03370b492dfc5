//! Conversion from CLI arguments to `ServiceConfig`

use crate::cli::main_impl::Cli;
use crate::config::ServiceConfig;
use anyhow::{Context, Result};

const MIB: u64 = 1024 * 1024;

/// Convert CLI arguments to the service configuration
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build and validate a `ServiceConfig` from parsed arguments
    pub(crate) fn from_cli(cli: &Cli) -> Result<ServiceConfig> {
        let max_upload_bytes = cli
            .max_upload_mb
            .checked_mul(MIB)
            .context("--max-upload-mb is too large")?;

        ServiceConfig::builder()
            .host(cli.host)
            .port(cli.port)
            .model_path(cli.model_path.clone())
            .target_size(cli.target_size)
            .api_base_url(cli.api_url.clone())
            .api_timeout_secs(cli.api_timeout)
            .max_upload_bytes(max_upload_bytes)
            .default_quality(cli.default_quality)
            .build()
            .map_err(Into::into)
    }
}
