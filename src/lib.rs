#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # withoutbg Background Removal Server
//!
//! HTTP service that removes image backgrounds. Each request is routed either
//! to a locally resident segmentation model ("opensource") or, when the caller
//! supplies an API key, to the withoutbg remote processing API ("api"). The
//! result is re-encoded as PNG, JPEG or WebP.
//!
//! ## Endpoints
//!
//! - `GET /api/health`
//! - `POST /api/remove-background` with multipart fields `file`, `format`,
//!   `quality` and `api_key`
//! - `GET /api/usage?api_key=...`
//!
//! ## Embedding
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use withoutbg_server::{server, AppState, ServiceConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder()
//!     .port(8080)
//!     .model_path(Some("models/withoutbg.onnx".into()))
//!     .build()?;
//!
//! let state = AppState::from_config(config)?;
//! server::serve(Arc::new(state)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): local ONNX inference with Tract
//! - `cli` (default): server binary, argument parsing and log subscriber
//! - `webp-support` (default): WebP decoding and lossy WebP output
//! - `tracing-json`: JSON log output

pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod inference;
pub mod processor;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod usage;
#[cfg(feature = "tract")]
pub mod utils;

// Public API exports
pub use backends::{StudioApiClient, UnavailableLocalRemover};
#[cfg(feature = "tract")]
pub use backends::TractRemover;
pub use config::{OutputFormat, PreprocessingConfig, ServiceConfig, ServiceConfigBuilder};
pub use error::{BackendError, BgRemovalError, Result};
pub use inference::{LocalRemover, RemoteBackend, UsageStats};
pub use processor::{BackendMode, BackgroundRemovalProcessor, ProcessingRequest};
pub use server::AppState;
pub use services::{EncodedImage, ImageBlob, ImageIOService, OutputFormatHandler};
pub use tracing_config::{TracingConfig, TracingFormat};
pub use usage::UsageProxy;

/// Version reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name reported by the health endpoint
pub const SERVICE_NAME: &str = "withoutbg-api";
