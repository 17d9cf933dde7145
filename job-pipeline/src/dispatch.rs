use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use common::{error::AppError, store::types::job::Job, utils::config::AppConfig};

use crate::{fallback, gateway::JobStoreGateway};

/// Documents above this size get the long synchronous-dispatch timeout.
const LARGE_TEXT_CHARS: usize = 4000;
const SYNC_TIMEOUT_SMALL: Duration = Duration::from_secs(10);
const SYNC_TIMEOUT_LARGE: Duration = Duration::from_secs(20);
const ASYNC_TIMEOUT: Duration = Duration::from_secs(10);
const OCR_TIMEOUT: Duration = Duration::from_secs(120);

/// The external webhooks a job can be dispatched to. URL selection is
/// configuration-driven; every entrypoint funnels through this enum instead
/// of carrying its own endpoint constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookTarget {
    /// Entity-detection workflow used by the browser flow.
    Processing,
    /// Workflow variant whose response is passed through to API callers.
    Api,
    /// Raw-text submissions from the text form.
    RawText,
    /// Text extraction for uploaded documents.
    Ocr,
}

#[derive(Debug, Clone)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: String,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Thin HTTP seam so dispatch behavior can be exercised against counting
/// fakes in tests.
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post_json(
        &self,
        url: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<WebhookResponse, AppError>;

    async fn post_file(
        &self,
        url: &str,
        file_name: String,
        content: Vec<u8>,
        record_id: i64,
        timeout: Duration,
    ) -> Result<WebhookResponse, AppError>;
}

#[derive(Clone, Default)]
pub struct HttpWebhookClient {
    client: reqwest::Client,
}

impl HttpWebhookClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl WebhookClient for HttpWebhookClient {
    async fn post_json(
        &self,
        url: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<WebhookResponse, AppError> {
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AppError::WebhookUnavailable(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }

    async fn post_file(
        &self,
        url: &str,
        file_name: String,
        content: Vec<u8>,
        record_id: i64,
        timeout: Duration,
    ) -> Result<WebhookResponse, AppError> {
        let part = reqwest::multipart::Part::bytes(content).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("job_id", record_id.to_string());

        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| AppError::WebhookUnavailable(format!("{url}: {e}")))?;

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }
}

#[derive(Clone)]
struct WebhookUrls {
    processing: String,
    api: String,
    raw_text: String,
    ocr: String,
}

impl WebhookUrls {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            processing: config.processing_webhook_url.clone(),
            api: config.api_webhook_url.clone(),
            raw_text: config.raw_text_webhook_url.clone(),
            ocr: config.ocr_webhook_url.clone(),
        }
    }

    fn url_for(&self, target: WebhookTarget) -> &str {
        match target {
            WebhookTarget::Processing => &self.processing,
            WebhookTarget::Api => &self.api,
            WebhookTarget::RawText => &self.raw_text,
            WebhookTarget::Ocr => &self.ocr,
        }
    }
}

/// Sends job text to the external processing webhooks. The external engine
/// gives no delivery guarantee, so the async path assumes silent failure is
/// possible and recovers through the local fallback anonymizer rather than
/// leaving the user stalled.
#[derive(Clone)]
pub struct DispatchClient {
    webhook: Arc<dyn WebhookClient>,
    gateway: Arc<JobStoreGateway>,
    urls: WebhookUrls,
}

impl DispatchClient {
    pub fn new(
        webhook: Arc<dyn WebhookClient>,
        gateway: Arc<JobStoreGateway>,
        config: &AppConfig,
    ) -> Self {
        Self {
            webhook,
            gateway,
            urls: WebhookUrls::from_config(config),
        }
    }

    fn sync_timeout(text: &str) -> Duration {
        if text.chars().count() > LARGE_TEXT_CHARS {
            SYNC_TIMEOUT_LARGE
        } else {
            SYNC_TIMEOUT_SMALL
        }
    }

    /// Fire-and-forget dispatch. The spawned task outlives the originating
    /// request; callers must not block on the returned handle.
    pub fn dispatch_async(
        &self,
        record_id: i64,
        text: String,
        target: WebhookTarget,
    ) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            let url = client.urls.url_for(target).to_string();
            let payload = json!({ "id": record_id, "text": text });
            match client.webhook.post_json(&url, payload, ASYNC_TIMEOUT).await {
                Ok(response) if response.is_success() => {
                    info!(record_id, url = %url, "dispatched job for processing");
                }
                Ok(response) => {
                    error!(
                        record_id,
                        status = response.status,
                        "processing webhook rejected dispatch"
                    );
                    client.apply_fallback(record_id, &text).await;
                }
                Err(err) => {
                    error!(record_id, error = %err, "processing webhook unreachable");
                    client.apply_fallback(record_id, &text).await;
                }
            }
        })
    }

    /// Blocking dispatch whose response is the caller's API: status and body
    /// are propagated verbatim.
    pub async fn dispatch_sync(
        &self,
        record_id: i64,
        text: &str,
        target: WebhookTarget,
    ) -> Result<WebhookResponse, AppError> {
        let url = self.urls.url_for(target);
        self.webhook
            .post_json(
                url,
                json!({ "id": record_id, "text": text }),
                Self::sync_timeout(text),
            )
            .await
    }

    /// Best-effort re-dispatch used by the polling escalation.
    pub async fn dispatch_retry(&self, job: &Job) -> Result<(), AppError> {
        let payload = json!({
            "id": job.record_id,
            "internal_ID": job.internal_id,
            "text": job.input_text,
            "action": "retry",
            "char_count": job.input_text.chars().count(),
        });
        let response = self
            .webhook
            .post_json(
                self.urls.url_for(WebhookTarget::Processing),
                payload,
                ASYNC_TIMEOUT,
            )
            .await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(AppError::WebhookUnavailable(format!(
                "retry dispatch rejected with status {}",
                response.status
            )))
        }
    }

    /// Send an uploaded document to the OCR webhook. The extracted text is
    /// written into the job record by the external service, not returned
    /// here.
    pub async fn dispatch_ocr(
        &self,
        record_id: i64,
        file_name: String,
        content: Vec<u8>,
    ) -> Result<(), AppError> {
        let response = self
            .webhook
            .post_file(
                self.urls.url_for(WebhookTarget::Ocr),
                file_name,
                content,
                record_id,
                OCR_TIMEOUT,
            )
            .await?;
        if response.is_success() {
            info!(record_id, "document sent to OCR webhook");
            Ok(())
        } else {
            Err(AppError::WebhookUnavailable(format!(
                "OCR webhook rejected upload with status {}",
                response.status
            )))
        }
    }

    /// Degraded path: anonymize locally and store the result as the job's
    /// output. Returns the output text when the write landed. A completed
    /// job is never overwritten with empty text.
    pub async fn apply_fallback(&self, record_id: i64, text: &str) -> Option<String> {
        warn!(record_id, "running local fallback anonymizer");
        let output = fallback::anonymize(text);
        if output.trim().is_empty() {
            warn!(record_id, "fallback produced no output, leaving job untouched");
            return None;
        }

        let fields = json!({ "output_text": output, "ai_response": output });
        match self.gateway.update_job(record_id, fields).await {
            Ok(()) => {
                info!(record_id, "stored fallback output");
                Some(output)
            }
            Err(err) => {
                // The job stays in processing until manual intervention or a
                // later retry escalation.
                error!(record_id, error = %err, "failed to store fallback output");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::store::client::MockRecordStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_config() -> AppConfig {
        serde_json::from_value(json!({
            "store_base_url": "https://store.example/api/v2",
            "store_token": "token",
            "processing_webhook_url": "https://hooks.example/process",
            "api_webhook_url": "https://hooks.example/api",
            "raw_text_webhook_url": "https://hooks.example/raw",
            "ocr_webhook_url": "https://hooks.example/ocr",
            "auth_email_webhook_url": "https://hooks.example/auth",
            "http_port": 8000
        }))
        .expect("test config")
    }

    /// Counts calls and answers with a fixed status.
    struct StubWebhook {
        status: u16,
        fail_transport: bool,
        calls: AtomicUsize,
        last_url: std::sync::Mutex<String>,
    }

    impl StubWebhook {
        fn responding(status: u16) -> Self {
            Self {
                status,
                fail_transport: false,
                calls: AtomicUsize::new(0),
                last_url: std::sync::Mutex::new(String::new()),
            }
        }

        fn unreachable() -> Self {
            Self {
                status: 0,
                fail_transport: true,
                calls: AtomicUsize::new(0),
                last_url: std::sync::Mutex::new(String::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl WebhookClient for StubWebhook {
        async fn post_json(
            &self,
            url: &str,
            _payload: Value,
            _timeout: Duration,
        ) -> Result<WebhookResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last_url.lock() {
                *last = url.to_string();
            }
            if self.fail_transport {
                return Err(AppError::WebhookUnavailable("connection refused".to_string()));
            }
            Ok(WebhookResponse {
                status: self.status,
                body: "{\"ok\":true}".to_string(),
            })
        }

        async fn post_file(
            &self,
            _url: &str,
            _file_name: String,
            _content: Vec<u8>,
            _record_id: i64,
            _timeout: Duration,
        ) -> Result<WebhookResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_transport {
                return Err(AppError::WebhookUnavailable("connection refused".to_string()));
            }
            Ok(WebhookResponse {
                status: self.status,
                body: String::new(),
            })
        }
    }

    fn client_with(
        webhook: Arc<StubWebhook>,
        store: MockRecordStore,
    ) -> DispatchClient {
        let config = test_config();
        let gateway = Arc::new(JobStoreGateway::new(Arc::new(store), &config));
        DispatchClient::new(webhook, gateway, &config)
    }

    #[test]
    fn sync_timeout_scales_with_document_size() {
        assert_eq!(DispatchClient::sync_timeout("short"), SYNC_TIMEOUT_SMALL);
        let large = "x".repeat(LARGE_TEXT_CHARS + 1);
        assert_eq!(DispatchClient::sync_timeout(&large), SYNC_TIMEOUT_LARGE);
    }

    #[tokio::test]
    async fn sync_dispatch_propagates_the_response_verbatim() {
        let webhook = Arc::new(StubWebhook::responding(200));
        let client = client_with(Arc::clone(&webhook), MockRecordStore::new());

        let response = client
            .dispatch_sync(1, "text", WebhookTarget::Api)
            .await
            .expect("response");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, "{\"ok\":true}");
        assert_eq!(
            *webhook.last_url.lock().expect("url"),
            "https://hooks.example/api"
        );
    }

    #[tokio::test]
    async fn successful_async_dispatch_leaves_the_store_alone() {
        let webhook = Arc::new(StubWebhook::responding(200));
        // No store expectations: a write would panic the mock.
        let client = client_with(Arc::clone(&webhook), MockRecordStore::new());

        client
            .dispatch_async(1, "Max Mustermann".to_string(), WebhookTarget::RawText)
            .await
            .expect("task");
        assert_eq!(webhook.calls(), 1);
    }

    #[tokio::test]
    async fn failed_async_dispatch_writes_fallback_output() {
        let webhook = Arc::new(StubWebhook::unreachable());
        let mut store = MockRecordStore::new();
        store
            .expect_update_record()
            .times(1)
            .withf(|_, id, fields| {
                let output = fields["output_text"].as_str().unwrap_or_default();
                *id == 9
                    && !output.contains("max@example.com")
                    && output.contains("{%{Email-")
                    && fields["ai_response"] == fields["output_text"]
            })
            .returning(|_, _, _| Ok(()));

        let client = client_with(Arc::clone(&webhook), store);
        client
            .dispatch_async(9, "Reach max@example.com".to_string(), WebhookTarget::Processing)
            .await
            .expect("task");
        assert_eq!(webhook.calls(), 1);
    }

    #[tokio::test]
    async fn rejected_async_dispatch_also_falls_back() {
        let webhook = Arc::new(StubWebhook::responding(500));
        let mut store = MockRecordStore::new();
        store
            .expect_update_record()
            .times(1)
            .returning(|_, _, _| Ok(()));

        let client = client_with(Arc::clone(&webhook), store);
        client
            .dispatch_async(3, "Reach max@example.com".to_string(), WebhookTarget::Processing)
            .await
            .expect("task");
    }

    #[tokio::test]
    async fn fallback_write_failure_returns_none() {
        let webhook = Arc::new(StubWebhook::unreachable());
        let mut store = MockRecordStore::new();
        store
            .expect_update_record()
            .times(1)
            .returning(|_, _, _| Err(AppError::StoreUnavailable("503".to_string())));

        let client = client_with(webhook, store);
        let stored = client.apply_fallback(4, "Reach max@example.com").await;
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn fallback_never_writes_empty_output() {
        let webhook = Arc::new(StubWebhook::unreachable());
        // No update expectation: writing would panic the mock.
        let client = client_with(webhook, MockRecordStore::new());
        assert!(client.apply_fallback(5, "   ").await.is_none());
    }

    #[tokio::test]
    async fn retry_dispatch_carries_the_retry_action() {
        let webhook = Arc::new(StubWebhook::responding(200));
        let client = client_with(Arc::clone(&webhook), MockRecordStore::new());
        let job = Job::from_value(json!({
            "Id": 6,
            "internal_ID": "uuid-6",
            "input_text": "some extracted text"
        }))
        .expect("job");

        client.dispatch_retry(&job).await.expect("retry");
        assert_eq!(webhook.calls(), 1);
        assert_eq!(
            *webhook.last_url.lock().expect("url"),
            "https://hooks.example/process"
        );
    }

    #[tokio::test]
    async fn rejected_retry_surfaces_webhook_unavailable() {
        let webhook = Arc::new(StubWebhook::responding(502));
        let client = client_with(webhook, MockRecordStore::new());
        let job = Job::from_value(json!({"Id": 7, "input_text": "text"})).expect("job");

        let err = client.dispatch_retry(&job).await.unwrap_err();
        assert!(matches!(err, AppError::WebhookUnavailable(_)));
    }
}
