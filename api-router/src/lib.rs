use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    anonymize::anonymize_text,
    ocr::submit_document,
    poll::{job_status, result_ajax},
    probes::{live, ready},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for API functionality, version 1
pub fn api_routes_v1<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/live", get(live))
        .route("/ready", get(ready))
        .route("/anonymize", post(anonymize_text))
        .route(
            "/ocr",
            post(submit_document).layer(DefaultBodyLimit::max(app_state.config.upload_max_bytes)),
        )
        .route("/result_ajax", get(result_ajax))
        .route("/job/{job_id}/status", get(job_status))
}
