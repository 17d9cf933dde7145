use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse},
    Json,
};
use common::error::AppError;
use job_pipeline::controller::PollResult;
use minijinja::context;
use serde::Deserialize;
use serde_json::json;

use crate::{error::HtmlError, html_state::HtmlState, routes::auth, templates, HtmlSession};

const SESSION_JOB_ID: &str = "job_id";

/// Result page. The job is looked up by its public UUID so the store's
/// primary key never shows up in URLs.
pub async fn show_result(
    State(state): State<HtmlState>,
    session: HtmlSession,
    Path(uuid): Path<String>,
) -> Result<impl IntoResponse, HtmlError> {
    let user_id = auth::session_user(&session);
    let job = state.gateway.get_job(&uuid, false).await?;

    if !state.gateway.job_visible_to(job.record_id, user_id).await? {
        return Err(HtmlError::from(AppError::Auth(format!(
            "job {} belongs to another user",
            job.record_id
        ))));
    }

    let (output_text, processing) = if job.is_complete() {
        match state.controller.poll_once(&uuid, 1).await? {
            PollResult::Complete(completed) => (completed.labeled_output, false),
            PollResult::Processing { .. } => (String::new(), true),
        }
    } else {
        (String::new(), true)
    };

    let page = templates::render(
        "result.html",
        context! {
            uuid => job.internal_id,
            record_id => job.record_id,
            input_text => job.input_text,
            output_text => output_text,
            processing => processing,
        },
    )?;
    Ok(Html(page))
}

#[derive(Debug, Deserialize)]
pub struct PollParams {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub attempt: u32,
}

/// AJAX polling endpoint behind the result page. Carries the browser's
/// attempt counter so the controller can apply the retry escalation.
pub async fn result_ajax(
    State(state): State<HtmlState>,
    Query(params): Query<PollParams>,
) -> Result<impl IntoResponse, HtmlError> {
    if params.job_id.trim().is_empty() {
        return Err(HtmlError::from(AppError::Validation(
            "No valid job_id provided".to_string(),
        )));
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
            "input_text": completed.input_text,
            "output_text": completed.labeled_output,
            "anonymized_text_with_prompts": completed.composed_output,
            "language": completed.language.code(),
        }),
    };
    Ok(Json(payload))
}

/// Status check for the job stored in the browser session.
pub async fn check_status(
    State(state): State<HtmlState>,
    session: HtmlSession,
) -> Result<impl IntoResponse, HtmlError> {
    let Some(record_id) = session.get::<i64>(SESSION_JOB_ID) else {
        return Err(HtmlError::from(AppError::NotFound(
            "no job found in session".to_string(),
        )));
    };

    let result = state
        .controller
        .poll_once(&record_id.to_string(), 1)
        .await?;
    let payload = match result {
        PollResult::Processing { .. } => json!({
            "status": "processing",
            "output_text": "",
        }),
        PollResult::Complete(completed) => json!({
            "status": "completed",
            "output_text": completed.labeled_output,
        }),
    };
    Ok(Json(payload))
}
