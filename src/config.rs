//! Configuration types for the background removal service

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Default port, matching the `PORT` fallback of the deployment scripts
pub const DEFAULT_PORT: u16 = 8000;

/// Default quality for lossy output formats
pub const DEFAULT_QUALITY: u8 = 95;

/// Default base URL of the remote processing API
pub const DEFAULT_API_BASE_URL: &str = "https://api.withoutbg.com";

/// Output image format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    /// PNG with alpha channel transparency
    #[default]
    Png,
    /// JPEG (no transparency, composited onto white)
    Jpeg,
    /// WebP with alpha channel transparency
    WebP,
}

impl OutputFormat {
    /// Resolve a caller-supplied format name
    ///
    /// Matching is ASCII case-insensitive and exact otherwise, so padded
    /// names are unrecognized. Unrecognized names fall back to PNG instead
    /// of failing.
    ///
    /// ```rust
    /// use withoutbg_server::OutputFormat;
    ///
    /// assert_eq!(OutputFormat::from_name("JPG"), OutputFormat::Jpeg);
    /// assert_eq!(OutputFormat::from_name("Jpeg"), OutputFormat::Jpeg);
    /// assert_eq!(OutputFormat::from_name("WEBP"), OutputFormat::WebP);
    /// assert_eq!(OutputFormat::from_name("bmp"), OutputFormat::Png);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Self::Jpeg,
            "webp" => Self::WebP,
            _ => Self::Png,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Png => write!(f, "PNG"),
            Self::Jpeg => write!(f, "JPEG"),
            Self::WebP => write!(f, "WEBP"),
        }
    }
}

/// Preprocessing parameters for the local segmentation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Square input edge length expected by the model
    pub target_size: u32,
    /// Per-channel mean subtracted after scaling to [0, 1]
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: 1024,
            normalization_mean: [0.5, 0.5, 0.5],
            normalization_std: [1.0, 1.0, 1.0],
        }
    }
}

/// Configuration for the HTTP service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Interface to bind
    pub host: IpAddr,

    /// Port to bind
    pub port: u16,

    /// ONNX model used by the local backend (None = local backend unavailable)
    pub model_path: Option<PathBuf>,

    /// Local model preprocessing parameters
    pub preprocessing: PreprocessingConfig,

    /// Base URL of the remote processing API
    pub api_base_url: String,

    /// Timeout applied to each remote API call, in seconds
    pub api_timeout_secs: u64,

    /// Maximum accepted multipart body size, in bytes
    pub max_upload_bytes: u64,

    /// Quality used when the caller does not send one (1-100)
    pub default_quality: u8,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            model_path: None,
            preprocessing: PreprocessingConfig::default(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_timeout_secs: 120,
            max_upload_bytes: 50 * 1024 * 1024,
            default_quality: DEFAULT_QUALITY,
        }
    }
}

impl ServiceConfig {
    /// Create a new configuration builder
    ///
    /// ```rust
    /// use withoutbg_server::ServiceConfig;
    ///
    /// let config = ServiceConfig::builder()
    ///     .port(9000)
    ///     .api_timeout_secs(30)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.port, 9000);
    /// ```
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Socket address the server binds to
    #[must_use]
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Validate all configuration parameters
    ///
    /// # Errors
    /// - Default quality outside 1-100
    /// - Zero API timeout or upload limit
    /// - API base URL without an http(s) scheme
    /// - Zero model target size or non-positive normalization std
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.default_quality) {
            return Err(BgRemovalError::config_value_error(
                "default quality",
                self.default_quality,
                "1-100",
                Some(DEFAULT_QUALITY),
            ));
        }

        if self.api_timeout_secs == 0 {
            return Err(BgRemovalError::invalid_config(
                "API timeout must be at least one second",
            ));
        }

        if self.max_upload_bytes == 0 {
            return Err(BgRemovalError::invalid_config(
                "Upload limit must be greater than zero",
            ));
        }

        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(BgRemovalError::invalid_config(format!(
                "API base URL must start with http:// or https://, got '{}'",
                self.api_base_url
            )));
        }

        if self.preprocessing.target_size == 0 {
            return Err(BgRemovalError::invalid_config(
                "Model target size must be greater than zero",
            ));
        }

        if self.preprocessing.normalization_std.iter().any(|s| *s <= 0.0) {
            return Err(BgRemovalError::invalid_config(
                "Normalization std values must be positive",
            ));
        }

        Ok(())
    }
}

/// Builder for `ServiceConfig`
#[derive(Debug, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: IpAddr) -> Self {
        self.config.host = host;
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn model_path(mut self, path: Option<PathBuf>) -> Self {
        self.config.model_path = path;
        self
    }

    #[must_use]
    pub fn target_size(mut self, size: u32) -> Self {
        self.config.preprocessing.target_size = size;
        self
    }

    #[must_use]
    pub fn preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.config.preprocessing = preprocessing;
        self
    }

    #[must_use]
    pub fn api_base_url<S: Into<String>>(mut self, url: S) -> Self {
        let url: String = url.into();
        self.config.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    #[must_use]
    pub fn default_quality(mut self, quality: u8) -> Self {
        self.config.default_quality = quality;
        self
    }

    /// Build the service configuration
    ///
    /// # Errors
    /// Returns `BgRemovalError::InvalidConfig` when validation fails
    pub fn build(self) -> Result<ServiceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
