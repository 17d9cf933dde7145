use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use common::error::AppError;

use crate::{error::HtmlError, html_state::HtmlState, routes::auth, HtmlSession};

async fn authorize(
    state: &HtmlState,
    session: &HtmlSession,
    job_id: &str,
) -> Result<i64, HtmlError> {
    let user_id = auth::session_user(session);
    let job = state.gateway.get_job(job_id, false).await?;
    if !state.gateway.job_visible_to(job.record_id, user_id).await? {
        return Err(HtmlError::from(AppError::Auth(format!(
            "job {} belongs to another user",
            job.record_id
        ))));
    }
    Ok(job.record_id)
}

fn text_attachment(file_name: String, body: String) -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={file_name}"),
            ),
        ],
        body,
    )
}

/// Download the anonymized text wrapped in the locale's prompt pair.
pub async fn download_text(
    State(state): State<HtmlState>,
    session: HtmlSession,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, HtmlError> {
    let record_id = authorize(&state, &session, &job_id).await?;
    let export = state.controller.fetch_export(&job_id).await?;
    Ok(text_attachment(
        format!("anonymized_{record_id}.txt"),
        export.composed_output,
    ))
}

/// Download the original extracted text.
pub async fn download_original(
    State(state): State<HtmlState>,
    session: HtmlSession,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, HtmlError> {
    let record_id = authorize(&state, &session, &job_id).await?;
    let job = state.gateway.get_job(&job_id, false).await?;
    if job.input_text.trim().is_empty() {
        return Err(HtmlError::from(AppError::Validation(format!(
            "no input text available for job {record_id}"
        ))));
    }
    Ok(text_attachment(
        format!("original_{record_id}.txt"),
        job.input_text,
    ))
}
