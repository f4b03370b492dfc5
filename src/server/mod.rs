//! HTTP transport
//!
//! Three endpoints under `/api`:
//! - `GET /api/health`
//! - `POST /api/remove-background` (multipart upload)
//! - `GET /api/usage?api_key=...`
//!
//! Every failure is answered with `{"detail": "..."}` and the status from
//! [`error::status_for`].

pub mod error;
pub mod handlers;
pub mod multipart;

use crate::{
    backends::{self, StudioApiClient},
    config::ServiceConfig,
    error::{BgRemovalError, Result},
    inference::{LocalRemover, RemoteBackend},
    processor::BackgroundRemovalProcessor,
    tracing_config::spans,
    usage::UsageProxy,
};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{Filter, Rejection, Reply};

/// Process-wide state shared by all requests
///
/// Built once at start-up and only read afterwards.
pub struct AppState {
    pub processor: BackgroundRemovalProcessor,
    pub usage: UsageProxy,
    pub config: ServiceConfig,
}

impl AppState {
    /// Assemble state around explicit backends
    pub fn new(
        config: ServiceConfig,
        local: Arc<dyn LocalRemover>,
        remote: Arc<dyn RemoteBackend>,
    ) -> Self {
        Self {
            processor: BackgroundRemovalProcessor::new(local, Arc::clone(&remote)),
            usage: UsageProxy::new(remote),
            config,
        }
    }

    /// Load the configured local model and build the remote API client
    ///
    /// # Errors
    /// Invalid configuration or a model that fails to load
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        config.validate()?;

        let local = {
            let _span = config
                .model_path
                .as_deref()
                .map(|path| spans::model_loading(path).entered());
            backends::local_from_config(&config)?
        };
        let remote: Arc<dyn RemoteBackend> = Arc::new(StudioApiClient::from_config(&config)?);

        Ok(Self::new(config, local, remote))
    }
}

/// Refuse bodies whose declared length is over `limit`
///
/// Bodies without a length (chunked) pass and are counted while the form is
/// read.
fn declared_length_within(
    limit: u64,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(move |length: Option<u64>| async move {
            match length {
                Some(length) if length > limit => {
                    Err(error::reject(BgRemovalError::payload_too_large(limit)))
                },
                _ => Ok(()),
            }
        })
        .untuple_one()
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&state))
}

/// Full route tree with error recovery, CORS and request spans
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let upload_limit = state.config.max_upload_bytes;

    let health = warp::path!("api" / "health")
        .and(warp::get())
        .and_then(handlers::health);

    let remove_background = warp::path!("api" / "remove-background")
        .and(warp::post())
        .and(declared_length_within(upload_limit))
        .and(warp::multipart::form().max_length(None))
        .and(with_state(Arc::clone(&state)))
        .and_then(handlers::remove_background);

    let usage = warp::path!("api" / "usage")
        .and(warp::get())
        .and(warp::query::<handlers::UsageParams>())
        .and(with_state(state))
        .and_then(handlers::usage);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec![
            "accept",
            "authorization",
            "content-type",
            "origin",
            "x-api-key",
            "x-requested-with",
        ]);

    health
        .or(remove_background)
        .or(usage)
        .recover(error::handle_rejection)
        .with(cors)
        .with(warp::trace(|info| {
            spans::request(info.method().as_str(), info.path())
        }))
}

/// Bind the listener and serve until `shutdown` resolves
///
/// Returns once in-flight requests have drained.
///
/// # Errors
/// `Io` when the address cannot be bound
pub async fn serve_with_shutdown<F>(state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr: SocketAddr = state.config.socket_addr();
    let (bound, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, shutdown)
        .map_err(|e| {
            BgRemovalError::Io(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("Failed to bind {addr}: {e}"),
            ))
        })?;

    tracing::info!(address = %bound, "Listening");
    server.await;
    tracing::info!("Server stopped");
    Ok(())
}

/// Serve until Ctrl-C
///
/// # Errors
/// As [`serve_with_shutdown`]
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    serve_with_shutdown(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received, draining connections");
    })
    .await
}
