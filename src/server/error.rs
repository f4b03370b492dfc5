//! Error to HTTP response mapping

use crate::error::BgRemovalError;
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// Wraps a service error so it can travel through warp's rejection chain
#[derive(Debug)]
pub struct ApiRejection(pub BgRemovalError);

impl warp::reject::Reject for ApiRejection {}

/// Reject the current request with a service error
pub fn reject(err: BgRemovalError) -> Rejection {
    warp::reject::custom(ApiRejection(err))
}

/// Error body shape shared by every failing endpoint
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// HTTP status for each service error
#[must_use]
pub fn status_for(err: &BgRemovalError) -> StatusCode {
    match err {
        BgRemovalError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// JSON `{"detail": ...}` response with the given status
pub fn error_reply(status: StatusCode, detail: impl Into<String>) -> warp::reply::Response {
    let body = ErrorBody {
        detail: detail.into(),
    };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Turn any rejection into a JSON error response
pub async fn handle_rejection(err: Rejection) -> Result<warp::reply::Response, Infallible> {
    if let Some(ApiRejection(api_err)) = err.find::<ApiRejection>() {
        let status = status_for(api_err);
        if status.is_server_error() {
            tracing::error!(error = %api_err, "Request failed");
        } else {
            tracing::warn!(error = %api_err, "Request rejected");
        }
        return Ok(error_reply(status, api_err.to_string()));
    }

    let (status, detail) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found".to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::LengthRequired>() {
        (StatusCode::LENGTH_REQUIRED, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidQuery>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::MissingHeader>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::InvalidHeader>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::UnsupportedMediaType>() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, e.to_string())
    } else {
        tracing::error!(rejection = ?err, "Unhandled rejection");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal Server Error".to_string(),
        )
    };

    Ok(error_reply(status, detail))
}
