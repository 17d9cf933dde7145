use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use serde_json::json;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, TryFromMultipart)]
pub struct OcrParams {
    #[form_data(limit = "10485760")]
    pub document: FieldData<Bytes>,
}

/// Create a job and hand the uploaded document to the external OCR webhook.
/// The extracted text arrives later through the record store; the caller
/// polls for it.
pub async fn submit_document(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<OcrParams>,
) -> Result<impl IntoResponse, ApiError> {
    let file_name = input
        .document
        .metadata
        .file_name
        .clone()
        .unwrap_or_else(|| "document".to_string());
    let content = input.document.contents.to_vec();
    if content.is_empty() {
        return Err(ApiError::ValidationError("No document provided".to_string()));
    }

    info!(file_name = %file_name, bytes = content.len(), "received OCR submission");

    let job = state.controller.create_for_upload().await?;
    state
        .dispatch
        .dispatch_ocr(job.record_id, file_name, content)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "status": "processing",
            "job_id": job.record_id,
            "internal_id": job.internal_id,
            "message": "Document submitted for OCR processing"
        })),
    ))
}
