use axum::{
    body::Bytes,
    extract::State,
    response::{IntoResponse, Redirect},
    Form,
};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::error::AppError;
use job_pipeline::{
    controller::{CreateOutcome, DispatchMode},
    dispatch::WebhookTarget,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::{error::HtmlError, html_state::HtmlState, routes::auth, HtmlSession};

const SESSION_JOB_ID: &str = "job_id";

const ALLOWED_EXTENSIONS: [&str; 8] = ["pdf", "png", "jpg", "jpeg", "gif", "txt", "doc", "docx"];

/// Content sniffed from leading bytes. Extensions alone are not trusted.
fn sniff_content(content: &[u8]) -> Option<&'static str> {
    if content.starts_with(b"%PDF") {
        Some("pdf")
    } else if content.starts_with(b"\x89PNG") {
        Some("png")
    } else if content.starts_with(b"\xff\xd8\xff") {
        Some("jpeg")
    } else if content.starts_with(b"GIF8") {
        Some("gif")
    } else if content.starts_with(b"PK\x03\x04") {
        Some("docx")
    } else if content.starts_with(b"\xd0\xcf\x11\xe0") {
        Some("doc")
    } else {
        None
    }
}

fn validate_upload(file_name: &str, content: &[u8]) -> Result<(), AppError> {
    if file_name.is_empty() || content.is_empty() {
        return Err(AppError::Validation("No file selected.".to_string()));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(AppError::Validation(format!(
            "File type not allowed. Allowed types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    // A recognized binary signature is enough; everything else must at least
    // look like text.
    if sniff_content(content).is_none() {
        let head = &content[..content.len().min(1024)];
        if std::str::from_utf8(head).is_err() || head.contains(&0) {
            return Err(AppError::Validation(
                "File type not allowed based on file content.".to_string(),
            ));
        }
    }
    Ok(())
}

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    #[form_data(limit = "10485760")]
    pub file: FieldData<Bytes>,
}

/// Handle a document upload: create the job with placeholder text, link it
/// to the signed-in user, and hand the file to the OCR webhook. The browser
/// is sent to the result page, which polls.
pub async fn upload_file(
    State(state): State<HtmlState>,
    session: HtmlSession,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, HtmlError> {
    let user_id = auth::session_user(&session);
    let file_name = input
        .file
        .metadata
        .file_name
        .clone()
        .unwrap_or_default();
    let content = input.file.contents.to_vec();
    validate_upload(&file_name, &content)?;

    info!(file_name = %file_name, bytes = content.len(), "received document upload");

    let job = state.controller.create_for_upload().await?;
    session.set(SESSION_JOB_ID, job.record_id);

    if let Some(user_id) = user_id {
        if let Err(err) = state.gateway.link_job_to_user(job.record_id, user_id).await {
            warn!(record_id = job.record_id, user_id, error = %err, "failed to link job to user");
        }
    }

    state
        .dispatch
        .dispatch_ocr(job.record_id, file_name, content)
        .await?;

    Ok(Redirect::to(&format!("/result/{}", job.internal_id)))
}

#[derive(Debug, Deserialize)]
pub struct UploadTextParams {
    #[serde(default)]
    pub raw_text: String,
}

/// Raw text submission: create the job and dispatch asynchronously; the
/// result page polls for completion.
pub async fn upload_text(
    State(state): State<HtmlState>,
    session: HtmlSession,
    Form(params): Form<UploadTextParams>,
) -> Result<impl IntoResponse, HtmlError> {
    let user_id = auth::session_user(&session);

    let outcome = state
        .controller
        .create_and_dispatch(&params.raw_text, DispatchMode::Async, WebhookTarget::RawText)
        .await?;
    let job = match outcome {
        CreateOutcome::Accepted(job) => job,
        CreateOutcome::Passthrough { job, .. } => job,
    };
    session.set(SESSION_JOB_ID, job.record_id);

    if let Some(user_id) = user_id {
        if let Err(err) = state.gateway.link_job_to_user(job.record_id, user_id).await {
            warn!(record_id = job.record_id, user_id, error = %err, "failed to link job to user");
        }
    }

    Ok(Redirect::to(&format!("/result/{}", job.internal_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_pdf_by_signature() {
        assert!(validate_upload("scan.pdf", b"%PDF-1.7 rest").is_ok());
    }

    #[test]
    fn accepts_plain_text() {
        assert!(validate_upload("notes.txt", b"Max Mustermann, Musterstra\xc3\x9fe 5").is_ok());
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = validate_upload("binary.exe", b"MZ\x90\x00").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_binary_masquerading_as_text() {
        let err = validate_upload("innocent.txt", b"\x00\xff\xfe\x01binary").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_binary_masquerading_as_pdf() {
        let err = validate_upload("fake.pdf", b"\x7fELF\x00\x00\x01").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_empty_uploads() {
        assert!(validate_upload("", b"").is_err());
        assert!(validate_upload("doc.pdf", b"").is_err());
    }
}
