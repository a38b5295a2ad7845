//! HTTP API for the coaching service.
//!
//! This module provides:
//! - the LINE webhook (`/callback`)
//! - chat history and summary endpoints
//! - grade statistics endpoints
//! - blob delivery for videos and thumbnails
//! - health and Prometheus metrics

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::service::CoachService;

pub mod chat;
pub mod media;
pub mod stats;
pub mod webhook;

use chat::{history_handler, summarize_handler};
use media::media_handler;
use stats::{class_stats_handler, user_stats_handler};
use webhook::callback_handler;

/// JSON API requests are answered or abandoned within this window
const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state
pub struct AppState {
    pub service: Arc<CoachService>,
    pub start_time: Instant,
    pub metrics: Option<PrometheusHandle>,
}

fn timeout_layer(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Build the API router
pub fn router(service: Arc<CoachService>, metrics: Option<PrometheusHandle>) -> Router {
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
        metrics,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chat endpoints
        .route("/chat/history", get(history_handler))
        .route("/chat/summarize", post(summarize_handler))
        // Stats endpoints
        .route("/db/stats/users/{id}", get(user_stats_handler))
        .route("/db/stats/class", get(class_stats_handler))
        .layer(timeout_layer(API_TIMEOUT));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/callback", post(callback_handler))
        .route("/media/{*path}", get(media_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health & Metrics ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;

    pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
        (status, json)
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}
