//! Request handlers for the three endpoints

use super::error::reject;
use super::multipart::{content_disposition, parse_remove_background};
use super::AppState;
use crate::error::BgRemovalError;
use instant::Instant;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::{header, StatusCode};
use warp::hyper::Body;
use warp::multipart::FormData;
use warp::{Rejection, Reply};

/// Liveness payload
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub service: String,
}

impl HealthStatus {
    #[must_use]
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            version: crate::VERSION.to_string(),
            service: crate::SERVICE_NAME.to_string(),
        }
    }
}

/// Query string of `GET /api/usage`
#[derive(Debug, Deserialize)]
pub struct UsageParams {
    pub api_key: Option<String>,
}

/// `GET /api/health`
pub async fn health() -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&HealthStatus::healthy()))
}

/// `POST /api/remove-background`
pub async fn remove_background(
    form: FormData,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Rejection> {
    let start = Instant::now();
    let form = parse_remove_background(
        form,
        state.config.default_quality,
        state.config.max_upload_bytes,
    )
    .await
        .map_err(reject)?;

    tracing::debug!(
        bytes = form.file.data.len(),
        format = %form.format,
        quality = form.quality,
        "Parsed upload"
    );

    let disposition = content_disposition(&form.format_name, form.format);
    let encoded = state
        .processor
        .process_upload(form.file, form.format, form.quality, form.api_key)
        .await
        .map_err(reject)?;

    tracing::info!(
        format = %encoded.format,
        bytes = encoded.data.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Returning processed image"
    );

    warp::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, encoded.content_type)
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from(encoded.data))
        .map_err(|e| reject(BgRemovalError::internal(format!("Failed to build response: {e}"))))
}

/// `GET /api/usage?api_key=...`
pub async fn usage(params: UsageParams, state: Arc<AppState>) -> Result<impl Reply, Rejection> {
    let api_key = params.api_key.ok_or_else(|| {
        reject(BgRemovalError::validation(
            "Missing required query parameter: api_key",
        ))
    })?;

    let stats = state.usage.get_usage(&api_key).await.map_err(reject)?;
    Ok(warp::reply::json(&stats))
}
