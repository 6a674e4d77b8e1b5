use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::collectors::MetricsAggregator;

const STREAM_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct HttpAppState {
    pub aggregator: Arc<MetricsAggregator>,
}

pub fn build_router(aggregator: Arc<MetricsAggregator>) -> Router {
    Router::new()
        .route("/", get(service_descriptor))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/health", get(health_handler))
        .route("/ws/metrics", get(ws_metrics_handler))
        .route("/favicon.ico", get(favicon))
        .with_state(HttpAppState { aggregator })
}

async fn service_descriptor(State(state): State<HttpAppState>) -> impl IntoResponse {
    let gpu = state.aggregator.gpu();
    Json(json!({
        "service": "telemetryd",
        "status": "running",
        "endpoints": {
            "websocket": "/ws/metrics",
            "metrics": "/api/metrics",
            "health": "/api/health"
        },
        "note": "WebSocket endpoints cannot be accessed via HTTP GET. Use a WebSocket client or the frontend app.",
        "nvidia_available": gpu.nvidia_available(),
        "rocm_available": gpu.rocm_available(),
        "platform": std::env::consts::OS
    }))
}

async fn metrics_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    Json(state.aggregator.collect_snapshot().await)
}

async fn health_handler(State(state): State<HttpAppState>) -> impl IntoResponse {
    let gpu = state.aggregator.gpu();
    Json(json!({
        "status": "healthy",
        "nvidia_available": gpu.nvidia_available(),
        "rocm_available": gpu.rocm_available(),
        "gpu_support": gpu.label(),
        "platform": std::env::consts::OS
    }))
}

// Browsers ask for this on every visit; answering saves a 404 in the logs.
async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Serves the metrics stream. A plain GET without an upgrade gets a pointer
/// to the right endpoints instead of an opaque upgrade error.
async fn ws_metrics_handler(
    upgrade: Option<WebSocketUpgrade>,
    State(state): State<HttpAppState>,
) -> Response {
    match upgrade {
        Some(upgrade) => upgrade.on_upgrade(move |socket| stream_snapshots(socket, state)),
        None => Json(json!({
            "error": "This is a WebSocket endpoint, not an HTTP endpoint",
            "message": "Use a WebSocket client to connect to /ws/metrics",
            "endpoints": {
                "websocket": "/ws/metrics",
                "http_metrics": "/api/metrics",
                "health": "/api/health"
            },
            "note": "WebSocket endpoints cannot be accessed via HTTP GET. The frontend app connects automatically."
        }))
        .into_response(),
    }
}

async fn stream_snapshots(mut socket: WebSocket, state: HttpAppState) {
    info!("websocket subscriber connected");
    let mut ticker = tokio::time::interval(STREAM_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let snapshot = state.aggregator.collect_snapshot().await;
        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(err) => {
                debug!(error = %err, "snapshot serialization failed");
                break;
            }
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            break;
        }
    }
    info!("websocket subscriber disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::gpu::GpuSupport;

    fn test_router() -> Router {
        let aggregator = Arc::new(MetricsAggregator::new(GpuSupport::unavailable(), 0));
        build_router(aggregator)
    }

    async fn get_json(uri: &str) -> (StatusCode, Value) {
        let response = test_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap();
        (status, value)
    }

    #[tokio::test]
    async fn health_reports_missing_gpu_support() {
        let (status, body) = get_json("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["gpu_support"], "None");
        assert_eq!(body["nvidia_available"], false);
        assert_eq!(body["rocm_available"], false);
    }

    #[tokio::test]
    async fn descriptor_lists_endpoints() {
        let (status, body) = get_json("/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "telemetryd");
        assert_eq!(body["status"], "running");
        assert_eq!(body["endpoints"]["websocket"], "/ws/metrics");
        assert_eq!(body["endpoints"]["health"], "/api/health");
    }

    #[tokio::test]
    async fn one_shot_metrics_returns_a_snapshot() {
        let (status, body) = get_json("/api/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["timestamp"].is_string());
        assert!(body["cpu"]["utilization"].is_number());
        assert!(body["memory"]["total"].is_number());
        assert!(body["gpu"].is_null());
    }

    #[tokio::test]
    async fn plain_get_on_websocket_route_explains_itself() {
        let (status, body) = get_json("/ws/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["error"].is_string());
        assert_eq!(body["endpoints"]["http_metrics"], "/api/metrics");
    }

    #[tokio::test]
    async fn favicon_is_no_content() {
        let response = test_router()
            .oneshot(
                Request::builder()
                    .uri("/favicon.ico")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
