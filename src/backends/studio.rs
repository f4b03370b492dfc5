//! HTTP client for the withoutbg remote processing API

use crate::config::ServiceConfig;
use crate::error::{BackendError, BgRemovalError, Result};
use crate::inference::{RemoteBackend, UsageStats};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat};
use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;

const API_KEY_HEADER: &str = "X-API-Key";
const REMOVE_PATH: &str = "/v1.0/image-without-background-base64";
const USAGE_PATH: &str = "/available-credit";

#[derive(Serialize)]
struct RemoveRequest<'a> {
    image_base64: &'a str,
}

#[derive(Deserialize)]
struct RemoveResponse {
    img_without_background_base64: String,
}

/// Remote backend talking to the withoutbg API
#[derive(Debug, Clone)]
pub struct StudioApiClient {
    client: Client,
    base_url: String,
}

impl StudioApiClient {
    /// Build a client for the given API root
    ///
    /// # Errors
    /// `InvalidConfig` when the HTTP client cannot be constructed
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("withoutbg-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BgRemovalError::invalid_config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// # Errors
    /// As [`Self::new`]
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.api_timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn check_status(response: Response) -> std::result::Result<Response, BackendError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

/// Translate a non-success API status into a caller-facing message
fn status_error(status: StatusCode, body: &str) -> BackendError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => BackendError::removal("Invalid API key"),
        StatusCode::PAYMENT_REQUIRED => BackendError::removal("Insufficient credits"),
        StatusCode::TOO_MANY_REQUESTS => BackendError::removal("Rate limit exceeded"),
        _ => {
            let body = body.trim();
            if body.is_empty() {
                BackendError::removal(format!("API request failed with status {}", status.as_u16()))
            } else {
                BackendError::removal(format!(
                    "API request failed with status {}: {body}",
                    status.as_u16()
                ))
            }
        },
    }
}

fn transport_error(e: &reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::removal("API request timed out")
    } else {
        BackendError::removal(format!("Failed to reach API: {e}"))
    }
}

/// Run codec work off the async workers
async fn offload<T, F>(stage: &'static str, work: F) -> std::result::Result<T, BackendError>
where
    T: Send + 'static,
    F: FnOnce() -> std::result::Result<T, BackendError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BackendError::unexpected(format!("{stage} worker failed: {e}")))?
}

fn encode_png_base64(image: &DynamicImage) -> std::result::Result<String, BackendError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| BackendError::unexpected(format!("Failed to encode upload: {e}")))?;
    Ok(STANDARD.encode(buffer.into_inner()))
}

fn decode_base64_image(encoded: &str) -> std::result::Result<DynamicImage, BackendError> {
    // Tolerate data URLs
    let payload = encoded
        .split_once(',')
        .filter(|(prefix, _)| prefix.starts_with("data:"))
        .map_or(encoded, |(_, data)| data);

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| BackendError::unexpected(format!("Invalid base64 in API response: {e}")))?;
    image::load_from_memory(&bytes)
        .map_err(|e| BackendError::unexpected(format!("Invalid image in API response: {e}")))
}

#[async_trait]
impl RemoteBackend for StudioApiClient {
    async fn remove(
        &self,
        image: DynamicImage,
        credential: &str,
    ) -> std::result::Result<DynamicImage, BackendError> {
        let encoded = offload("upload encode", move || encode_png_base64(&image)).await?;
        tracing::debug!(payload_bytes = encoded.len(), "Sending image to remote API");

        let response = self
            .client
            .post(self.endpoint(REMOVE_PATH))
            .header(API_KEY_HEADER, credential)
            .json(&RemoveRequest {
                image_base64: &encoded,
            })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let body: RemoveResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::unexpected(format!("Malformed API response: {e}")))?;

        offload("response decode", move || {
            decode_base64_image(&body.img_without_background_base64)
        })
        .await
    }

    async fn usage(&self, credential: &str) -> std::result::Result<UsageStats, BackendError> {
        let response = self
            .client
            .get(self.endpoint(USAGE_PATH))
            .header(API_KEY_HEADER, credential)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        Self::check_status(response)
            .await?
            .json::<UsageStats>()
            .await
            .map_err(|e| BackendError::unexpected(format!("Malformed usage response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_status_messages() {
        assert_eq!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            BackendError::removal("Invalid API key")
        );
        assert_eq!(
            status_error(StatusCode::PAYMENT_REQUIRED, "{}"),
            BackendError::removal("Insufficient credits")
        );
        assert_eq!(
            status_error(StatusCode::BAD_GATEWAY, " upstream down \n"),
            BackendError::removal("API request failed with status 502: upstream down")
        );
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = StudioApiClient::new("http://localhost:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint(USAGE_PATH),
            "http://localhost:9/available-credit"
        );
    }

    #[test]
    fn test_base64_image_accepts_data_url() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])));
        let encoded = encode_png_base64(&image).unwrap();

        let plain = decode_base64_image(&encoded).unwrap();
        let data_url = decode_base64_image(&format!("data:image/png;base64,{encoded}")).unwrap();

        assert_eq!(plain.to_rgba8(), image.to_rgba8());
        assert_eq!(data_url.to_rgba8(), image.to_rgba8());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_codec_work_leaves_runtime_responsive() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4])));
        let encoded = offload("upload encode", move || encode_png_base64(&image))
            .await
            .unwrap();

        // Runs on the blocking pool, not the runtime thread
        let caller = std::thread::current().id();
        let worker = offload("thread check", move || Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(caller, worker);

        let decoded = offload("response decode", move || decode_base64_image(&encoded))
            .await
            .unwrap();
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0).0, [1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_base64_is_unexpected() {
        assert!(matches!(
            decode_base64_image("@@@"),
            Err(BackendError::Unexpected(_))
        ));
    }
}
