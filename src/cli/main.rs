//! withoutbg server entry point
//!
//! Parses flags and environment, installs logging, loads backends and
//! serves until Ctrl-C.

use super::config::CliConfigBuilder;
use crate::{
    server::{self, AppState},
    tracing_config::{TracingConfig, TracingFormat},
};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Log output format
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum LogFormat {
    /// Colored human-readable output
    Console,
    /// Plain single-line output
    Compact,
    /// One JSON object per event
    #[cfg(feature = "tracing-json")]
    Json,
}

impl From<LogFormat> for TracingFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Console => Self::Console,
            LogFormat::Compact => Self::Compact,
            #[cfg(feature = "tracing-json")]
            LogFormat::Json => Self::Json,
        }
    }
}

/// HTTP service for image background removal
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "withoutbg-server")]
pub struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = crate::config::DEFAULT_PORT)]
    pub port: u16,

    /// ONNX segmentation model used when a request carries no api_key
    #[arg(short, long, env = "WITHOUTBG_MODEL_PATH", value_name = "PATH")]
    pub model_path: Option<PathBuf>,

    /// Square input size expected by the model
    #[arg(long, default_value_t = 1024)]
    pub target_size: u32,

    /// Root URL of the remote processing API
    #[arg(long, env = "WITHOUTBG_API_URL", default_value = crate::config::DEFAULT_API_BASE_URL)]
    pub api_url: String,

    /// Remote API request timeout in seconds
    #[arg(long, default_value_t = 120)]
    pub api_timeout: u64,

    /// Largest accepted upload in MiB
    #[arg(long, default_value_t = 50)]
    pub max_upload_mb: u64,

    /// Quality used when a request omits it
    #[arg(long, default_value_t = crate::config::DEFAULT_QUALITY)]
    pub default_quality: u8,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Console)]
    pub log_format: LogFormat,

    /// Filter directives, overrides --verbose
    #[arg(long, env = "RUST_LOG")]
    pub log_filter: Option<String>,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(cli.log_format.into());
    if let Some(filter) = &cli.log_filter {
        logging = logging.with_env_filter(filter);
    }
    logging.init().context("Failed to initialize tracing")?;

    let config = CliConfigBuilder::from_cli(&cli).context("Invalid configuration")?;

    info!(
        version = crate::VERSION,
        address = %config.socket_addr(),
        local_model = config.model_path.is_some(),
        api = %config.api_base_url,
        "Starting withoutbg server"
    );

    let state = AppState::from_config(config).context("Failed to initialize backends")?;
    server::serve(Arc::new(state))
        .await
        .context("Server terminated with an error")?;

    Ok(())
}
