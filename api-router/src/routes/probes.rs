use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

// Public, unauthenticated endpoints for k8s/systemd probes.

pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn ready() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
