//! Directory, stats and health endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use castline_engine::OrchestratorStats;
use castline_ipc::ActiveStream;

use crate::HttpState;

/// `GET /api/streams`
pub async fn list_streams(State(state): State<HttpState>) -> Json<Vec<ActiveStream>> {
    Json(state.orchestrator.list_active())
}

/// `GET /api/stats`
pub async fn stats(State(state): State<HttpState>) -> Json<OrchestratorStats> {
    Json(state.orchestrator.stats())
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use castline_ipc::SessionId;
    use tower::ServiceExt;

    use crate::testing::TestServer;

    #[tokio::test]
    async fn test_health() {
        let server = TestServer::new();
        let response = server
            .router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_streams_lists_live_sessions() {
        let server = TestServer::new();
        server
            .orchestrator
            .start(SessionId::from("c1"), "/live/ryuu".parse().unwrap())
            .await
            .unwrap();

        let response = server
            .router()
            .oneshot(Request::get("/api/streams").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let entries = json.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["id"], "c1");
        assert_eq!(entries[0]["appName"], "live");
        assert_eq!(entries[0]["streamIdentity"], "ryuu");
        assert_eq!(entries[0]["inputCodec"], "h264");
        assert_eq!(entries[0]["viewerCount"], 0);
        assert_eq!(entries[0]["renditions"].as_array().unwrap().len(), 2);

        server.orchestrator.shutdown().await;
    }

    #[tokio::test]
    async fn test_stats_snapshot() {
        let server = TestServer::new();
        let response = server
            .router()
            .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["activeSessions"], 0);
        assert_eq!(json["sessionsStarted"], 0);
    }

    #[tokio::test]
    async fn test_cross_origin_requests_allowed() {
        let server = TestServer::new();
        server.write_media("live", "ryuu_master.m3u8", b"#EXTM3U\n");

        for uri in ["/api/streams", "/hls/live/ryuu_master.m3u8"] {
            let request = Request::get(uri)
                .header(header::ORIGIN, "https://player.example.com")
                .body(Body::empty())
                .unwrap();
            let response = server.router().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        }

        let preflight = Request::builder()
            .method("OPTIONS")
            .uri("/api/streams")
            .header(header::ORIGIN, "https://player.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = server.router().oneshot(preflight).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_HEADERS));
    }
}
