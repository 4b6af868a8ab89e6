//! HLS file delivery with viewer accounting.

use std::net::{IpAddr, SocketAddr};

use axum::body::Body;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use castline_ipc::{is_tracked_media, stream_identity_from_file};
use tracing::{debug, trace};

use crate::error::TransportError;
use crate::{HttpState, TransportResult};

/// Content type for a served file, or `None` if castline does not serve it.
pub fn content_type_for(file: &str) -> Option<&'static str> {
    let (_, ext) = file.rsplit_once('.')?;
    match ext {
        "m3u8" => Some("application/vnd.apple.mpegurl"),
        "ts" => Some("video/mp2t"),
        "m4s" => Some("video/iso.segment"),
        "mp4" => Some("video/mp4"),
        "jpg" => Some("image/jpeg"),
        _ => None,
    }
}

/// Client identity for viewer counting.
///
/// The first `X-Forwarded-For` hop is used only when the socket peer is one
/// of `trusted_proxies`; otherwise the peer address is the client.
pub fn client_address(headers: &HeaderMap, peer: SocketAddr, trusted_proxies: &[IpAddr]) -> String {
    if !trusted_proxies.contains(&peer.ip()) {
        return peer.ip().to_string();
    }
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// `GET /hls/{app}/{file}`
pub async fn serve_media(
    State(state): State<HttpState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path((app, file)): Path<(String, String)>,
    headers: HeaderMap,
) -> TransportResult<Response> {
    if !is_safe_name(&app) || !is_safe_name(&file) {
        return Err(TransportError::InvalidMediaPath(format!("{app}/{file}")));
    }
    let content_type = content_type_for(&file).ok_or(TransportError::NotFound)?;

    let path = state.media_root.join(&app).join(&file);
    let data = tokio::fs::read(&path).await?;
    trace!(path = %path.display(), bytes = data.len(), "Serving media");

    if is_tracked_media(&file) {
        if let Some(stream) = stream_identity_from_file(&file) {
            let client = client_address(&headers, peer, &state.trusted_proxies);
            debug!(stream, client = %client, "Viewer fetch");
            state.orchestrator.record_fetch(stream, &client);
        }
    }

    let cache_control = if file.ends_with(".m3u8") || file.ends_with(".jpg") {
        "no-cache"
    } else {
        "public, max-age=60"
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CACHE_CONTROL, cache_control)
        .body(Body::from(Bytes::from(data)))
        .map_err(|e| TransportError::Io(std::io::Error::other(e)))
}
