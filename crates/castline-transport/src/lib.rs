//! HTTP surface for castline.
//!
//! Routes:
//! - `POST /api/v1/streams/publish`, `POST /api/v1/streams/publish_done` -
//!   nginx-rtmp style publish notifications
//! - `GET /hls/{app}/{file}` - playlists, segments and thumbnails
//! - `GET /api/streams` - live stream directory
//! - `GET /api/stats` - orchestrator counters
//! - `GET /health`
//!
//! Every route answers cross-origin requests from any origin.

mod api;
mod error;
mod hls;
mod webhook;

#[cfg(test)]
mod testing;

pub use error::TransportError;
pub use hls::{client_address, content_type_for};
pub use webhook::PublishForm;

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use castline_engine::Orchestrator;
use castline_ipc::LifecycleHooks;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Shared state of every handler.
#[derive(Clone)]
pub struct HttpState {
    /// Read side: directory, viewers, stats.
    pub orchestrator: Arc<Orchestrator>,

    /// Where publish notifications are forwarded.
    pub hooks: Arc<dyn LifecycleHooks>,

    /// Root directory of HLS output.
    pub media_root: PathBuf,

    /// Peers whose `X-Forwarded-For` header names the real client.
    pub trusted_proxies: Arc<[IpAddr]>,
}

/// Build the router with every route.
pub fn create_router(state: HttpState) -> Router {
    Router::new()
        .route("/api/v1/streams/publish", post(webhook::on_publish))
        .route("/api/v1/streams/publish_done", post(webhook::on_publish_done))
        .route("/hls/{app}/{file}", get(hls::serve_media))
        .route("/api/streams", get(api::list_streams))
        .route("/api/stats", get(api::stats))
        .route("/health", get(api::health))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve `router` on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> TransportResult<()> {
    info!(addr = ?listener.local_addr().ok(), "HTTP server listening");
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await?;
    info!("HTTP server stopped");
    Ok(())
}
