//! HTTP handlers for the non-WebSocket routes

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde::Serialize;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    status: &'static str,
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthStatus { status: "ok" }))
}

/// In-browser demo page for poking at the echo endpoint
pub async fn index() -> impl IntoResponse {
    Html(INDEX_HTML)
}
