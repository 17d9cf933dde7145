use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    error::AppError,
    store::types::job::{Job, JobStatus, OCR_PLACEHOLDER_TEXT},
    utils::language::Language,
};

use crate::{
    dispatch::{DispatchClient, WebhookResponse, WebhookTarget},
    gateway::JobStoreGateway,
};

/// Polling attempts after which a best-effort re-dispatch is issued.
pub const RETRY_AFTER_ATTEMPTS: u32 = 5;
/// Polling attempts after which the local fallback anonymizer takes over.
pub const FALLBACK_AFTER_ATTEMPTS: u32 = 10;

/// Pause after a retry dispatch before answering the poll, giving the
/// external workflow a head start on the re-delivered job.
const RETRY_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Block on the webhook and hand its response through to the caller.
    Sync,
    /// Fire-and-forget; the caller polls for the result.
    Async,
}

#[derive(Debug)]
pub enum CreateOutcome {
    /// Job created and dispatched; the caller polls for the result.
    Accepted(Job),
    /// Job created and processed synchronously; the webhook response is the
    /// caller-facing API.
    Passthrough {
        job: Job,
        response: WebhookResponse,
    },
}

/// Fully rendered presentation payload for a finished job.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedJob {
    pub record_id: i64,
    pub internal_id: String,
    pub input_text: String,
    /// Anonymized text exactly as stored.
    pub raw_output: String,
    /// Label-transformed rendering of `raw_output`.
    pub labeled_output: String,
    /// `labeled_output` wrapped in the locale's header/footer prompt pair.
    pub composed_output: String,
    pub language: Language,
    pub system_prompt: &'static str,
}

#[derive(Debug)]
pub enum PollResult {
    Processing { attempt: u32 },
    Complete(Box<CompletedJob>),
}

impl PollResult {
    pub fn status(&self) -> JobStatus {
        match self {
            PollResult::Processing { .. } => JobStatus::Processing,
            PollResult::Complete(_) => JobStatus::Complete,
        }
    }
}

/// Placeholder-to-label transform. The external workflow already emits
/// labeled placeholders, so this is the identity today; it stays as the seam
/// localized labeling would hang off.
fn replace_prefixes_with_labels(text: &str, _language: Language) -> String {
    text.to_string()
}

fn compose_with_prompts(labeled: &str, language: Language) -> String {
    format!(
        "{}\n\n{}\n\n{}",
        language.header_prompt(),
        labeled,
        language.footer_prompt()
    )
}

/// Orchestrates the job flow: create, dispatch, poll with retry escalation,
/// and render the final presentation payload.
pub struct JobLifecycleController {
    gateway: Arc<JobStoreGateway>,
    dispatch: DispatchClient,
    /// (record id, extracted-text length) pairs whose fallback escalation
    /// already ran. In-process only; concurrent server instances each keep
    /// their own set, which is an accepted single-instance limitation.
    triggered: Mutex<HashSet<(i64, usize)>>,
}

impl JobLifecycleController {
    pub fn new(gateway: Arc<JobStoreGateway>, dispatch: DispatchClient) -> Self {
        Self {
            gateway,
            dispatch,
            triggered: Mutex::new(HashSet::new()),
        }
    }

    pub async fn create_and_dispatch(
        &self,
        text: &str,
        mode: DispatchMode,
        target: WebhookTarget,
    ) -> Result<CreateOutcome, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("missing or empty text".to_string()));
        }

        let internal_id = Uuid::new_v4().to_string();
        let job = self
            .gateway
            .create_job(json!({
                "internal_ID": internal_id,
                "input_text": text,
                "output_text": "",
                "status": JobStatus::Processing.as_str(),
            }))
            .await?;

        match mode {
            DispatchMode::Sync => {
                let response = self
                    .dispatch
                    .dispatch_sync(job.record_id, text, target)
                    .await?;
                Ok(CreateOutcome::Passthrough { job, response })
            }
            DispatchMode::Async => {
                self.dispatch
                    .dispatch_async(job.record_id, text.to_string(), target);
                Ok(CreateOutcome::Accepted(job))
            }
        }
    }

    /// Create a job for an uploaded document. `input_text` starts as the OCR
    /// placeholder; the external OCR service fills in the real text later.
    pub async fn create_for_upload(&self) -> Result<Job, AppError> {
        let internal_id = Uuid::new_v4().to_string();
        self.gateway
            .create_job(json!({
                "internal_ID": internal_id,
                "input_text": OCR_PLACEHOLDER_TEXT,
                "output_text": "",
                "status": JobStatus::Processing.as_str(),
            }))
            .await
    }

    /// One poll step. Attempts are counted by the caller; exhausting them
    /// never forces a job into `error` — the caller decides how long to keep
    /// polling.
    pub async fn poll_once(&self, identifier: &str, attempt: u32) -> Result<PollResult, AppError> {
        let job = self.gateway.get_job(identifier, true).await?;

        if job.is_complete() {
            let completed = self.render_completed(&job, true).await;
            return Ok(PollResult::Complete(Box::new(completed)));
        }

        if attempt > FALLBACK_AFTER_ATTEMPTS {
            if job.has_real_input() && self.claim_fallback_trigger(&job) {
                info!(
                    record_id = job.record_id,
                    attempt, "escalating to local fallback anonymizer"
                );
                if let Some(output) = self
                    .dispatch
                    .apply_fallback(job.record_id, &job.input_text)
                    .await
                {
                    let mut done = job;
                    done.output_text = output;
                    let completed = self.render_completed(&done, false).await;
                    return Ok(PollResult::Complete(Box::new(completed)));
                }
                // The write failed; the job is stalled until a later poll or
                // manual intervention.
            }
            return Ok(PollResult::Processing { attempt });
        }

        if attempt > RETRY_AFTER_ATTEMPTS && job.has_real_input() {
            if let Err(err) = self.dispatch.dispatch_retry(&job).await {
                warn!(record_id = job.record_id, error = %err, "retry dispatch failed");
            }
            sleep(RETRY_PAUSE).await;
        }

        Ok(PollResult::Processing { attempt })
    }

    /// Presentation payload for the export routes. Falls back to the cached
    /// labeled text when `output_text` is empty but a rendering was
    /// persisted earlier.
    pub async fn fetch_export(&self, identifier: &str) -> Result<CompletedJob, AppError> {
        let job = self.gateway.get_job(identifier, false).await?;
        if job.is_complete() {
            return Ok(self.render_completed(&job, true).await);
        }
        if !job.full_prefix_text.is_empty() {
            let mut cached = job;
            cached.output_text = cached.full_prefix_text.clone();
            return Ok(self.render_completed(&cached, false).await);
        }
        Err(AppError::Validation(format!(
            "no output text available for job {}",
            job.record_id
        )))
    }

    /// The lock only makes check-then-insert atomic; webhook and store calls
    /// happen outside it.
    fn claim_fallback_trigger(&self, job: &Job) -> bool {
        let key = (job.record_id, job.input_text.len());
        match self.triggered.lock() {
            Ok(mut triggered) => triggered.insert(key),
            Err(poisoned) => poisoned.into_inner().insert(key),
        }
    }

    /// Compute the labeled presentation of a finished job. `full_prefix_text`
    /// is preferred as a cache, but `output_text` stays the source of truth:
    /// when the stored language says the cache predates it, the labels are
    /// recomputed, and fresh renderings are persisted best-effort.
    async fn render_completed(&self, job: &Job, persist: bool) -> CompletedJob {
        let language = Language::resolve(job.language.as_deref(), &job.input_text);
        let recomputed = replace_prefixes_with_labels(&job.output_text, language);

        let labeled = if job.full_prefix_text.is_empty() {
            recomputed
        } else if job.language.is_some() && job.full_prefix_text != recomputed {
            recomputed
        } else {
            job.full_prefix_text.clone()
        };

        if persist && job.full_prefix_text != labeled {
            if let Err(err) = self
                .gateway
                .update_job(job.record_id, json!({ "full_prefix_text": labeled }))
                .await
            {
                warn!(
                    record_id = job.record_id,
                    error = %err,
                    "failed to persist labeled text"
                );
            }
        }

        CompletedJob {
            record_id: job.record_id,
            internal_id: job.internal_id.clone(),
            input_text: job.input_text.clone(),
            raw_output: job.output_text.clone(),
            composed_output: compose_with_prompts(&labeled, language),
            labeled_output: labeled,
            language,
            system_prompt: language.system_prompt(),
        }
    }
}
