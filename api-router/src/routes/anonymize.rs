use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use job_pipeline::{
    controller::{CreateOutcome, DispatchMode},
    dispatch::WebhookTarget,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct AnonymizeParams {
    #[serde(default)]
    pub text: String,
}

/// Create a job and run the API-only workflow synchronously. The webhook
/// response is the caller-facing API, so status and body are passed through
/// verbatim.
pub async fn anonymize_text(
    State(state): State<ApiState>,
    Json(params): Json<AnonymizeParams>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .controller
        .create_and_dispatch(&params.text, DispatchMode::Sync, WebhookTarget::Api)
        .await?;

    match outcome {
        CreateOutcome::Passthrough { job, response } => {
            info!(
                record_id = job.record_id,
                status = response.status,
                "anonymize passthrough finished"
            );
            let status =
                StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
            match serde_json::from_str::<Value>(&response.body) {
                Ok(value) => Ok((status, Json(value)).into_response()),
                Err(_) => Ok((status, response.body).into_response()),
            }
        }
        CreateOutcome::Accepted(job) => {
            // Sync mode always yields a passthrough; anything else is a bug.
            Err(ApiError::from(common::error::AppError::Internal(format!(
                "sync dispatch for job {} returned no response",
                job.record_id
            ))))
        }
    }
}
