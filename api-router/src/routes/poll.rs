use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use job_pipeline::controller::PollResult;
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PollParams {
    #[serde(default)]
    pub job_id: String,
    /// Caller-maintained attempt counter driving the retry escalation.
    #[serde(default)]
    pub attempt: u32,
}

/// Polling endpoint for job results. Each call carries the caller's attempt
/// counter; the lifecycle controller applies the escalation policy.
pub async fn result_ajax(
    State(state): State<ApiState>,
    Query(params): Query<PollParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.job_id.trim().is_empty() {
        return Err(ApiError::ValidationError(
            "No valid job_id provided".to_string(),
        ));
    }

    let result = state
        .controller
        .poll_once(&params.job_id, params.attempt)
        .await?;

    let payload = match result {
        PollResult::Processing { attempt } => json!({
            "status": "processing",
            "job_id": params.job_id,
            "attempt": attempt + 1,
        }),
        PollResult::Complete(completed) => json!({
            "status": "complete",
            "job_id": params.job_id,
            "record_id": completed.record_id,
            "internal_id": completed.internal_id,
            "input_text": completed.input_text,
            "raw_anonymized_text": completed.raw_output,
            "labeled_anonymized_text": completed.labeled_output,
            "anonymized_text_with_prompts": completed.composed_output,
            "system_prompt": completed.system_prompt,
            "language": completed.language.code(),
        }),
    };
    Ok(Json(payload))
}

/// Status of a single job, labeled output included once it is available.
pub async fn job_status(
    State(state): State<ApiState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.controller.poll_once(&job_id, 1).await?;
    let payload = match result {
        PollResult::Processing { .. } => json!({
            "status": "processing",
            "output_text": null,
        }),
        PollResult::Complete(completed) => json!({
            "status": "complete",
            "output_text": completed.labeled_output,
        }),
    };
    Ok(Json(payload))
}
