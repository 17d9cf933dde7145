use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use common::{
    error::AppError,
    store::{
        client::RecordStore,
        types::{job::Job, user::User},
    },
    utils::config::AppConfig,
};

/// Successful lookups are served from memory for this long to absorb rapid
/// repeated polling. Entries past the window are always re-fetched.
pub const JOB_CACHE_TTL: Duration = Duration::from_secs(5);

/// Typed job and user operations over the record store. Hides the identifier
/// ambiguity (numeric primary key vs. client-assigned UUID) behind one lookup
/// function so callers never branch on identifier shape.
pub struct JobStoreGateway {
    store: Arc<dyn RecordStore>,
    job_table: String,
    user_table: String,
    job_user_link_field: String,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

struct CacheEntry {
    job: Job,
    fetched_at: Instant,
}

impl JobStoreGateway {
    pub fn new(store: Arc<dyn RecordStore>, config: &AppConfig) -> Self {
        Self {
            store,
            job_table: config.job_table.clone(),
            user_table: config.user_table.clone(),
            job_user_link_field: config.job_user_link_field.clone(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Empty strings and unresolved `{{ … }}` template artifacts never reach
    /// the network.
    fn is_invalid_identifier(identifier: &str) -> bool {
        identifier.is_empty() || (identifier.starts_with("{{") && identifier.ends_with("}}"))
    }

    async fn cached(&self, identifier: &str) -> Option<Job> {
        let cache = self.cache.read().await;
        let entry = cache.get(identifier)?;
        if entry.fetched_at.elapsed() >= JOB_CACHE_TTL {
            return None;
        }
        Some(entry.job.clone())
    }

    async fn remember(&self, identifier: &str, job: &Job) {
        let mut cache = self.cache.write().await;
        cache.insert(
            identifier.to_string(),
            CacheEntry {
                job: job.clone(),
                fetched_at: Instant::now(),
            },
        );
    }

    async fn forget_record(&self, record_id: i64) {
        let mut cache = self.cache.write().await;
        cache.retain(|_, entry| entry.job.record_id != record_id);
    }

    pub async fn create_job(&self, fields: Value) -> Result<Job, AppError> {
        let record = self.store.create_record(&self.job_table, fields).await?;
        let job = Job::from_value(record)?;
        info!(
            record_id = job.record_id,
            internal_id = %job.internal_id,
            "created job record"
        );
        Ok(job)
    }

    /// Resolve a job by numeric record id or client-assigned internal id.
    /// Numeric identifiers try the primary-key fetch first and fall back to
    /// the filtered query when that fails.
    pub async fn get_job(&self, identifier: &str, skip_log: bool) -> Result<Job, AppError> {
        let identifier = identifier.trim();
        if Self::is_invalid_identifier(identifier) {
            return Err(AppError::NotFound(format!(
                "invalid job identifier '{identifier}'"
            )));
        }

        if let Some(job) = self.cached(identifier).await {
            if !skip_log {
                debug!(identifier, "job cache hit");
            }
            return Ok(job);
        }

        if let Ok(record_id) = identifier.parse::<i64>() {
            match self.store.get_record(&self.job_table, record_id).await {
                Ok(record) => {
                    let job = Job::from_value(record)?;
                    self.remember(identifier, &job).await;
                    return Ok(job);
                }
                Err(err) => {
                    if !skip_log {
                        warn!(
                            identifier,
                            error = %err,
                            "direct job lookup failed, falling back to filtered query"
                        );
                    }
                }
            }
        }

        let record = self
            .store
            .find_record(&self.job_table, "internal_ID", identifier)
            .await?;
        match record {
            Some(record) => {
                let job = Job::from_value(record)?;
                self.remember(identifier, &job).await;
                Ok(job)
            }
            None => Err(AppError::NotFound(format!("job '{identifier}'"))),
        }
    }

    /// Partial update; all mutated fields travel in a single store call.
    /// Cached entries for the record are dropped so the next poll observes
    /// the new state.
    pub async fn update_job(&self, record_id: i64, fields: Value) -> Result<(), AppError> {
        self.store
            .update_record(&self.job_table, record_id, fields)
            .await?;
        self.forget_record(record_id).await;
        Ok(())
    }

    pub async fn link_job_to_user(&self, record_id: i64, user_id: i64) -> Result<(), AppError> {
        self.store
            .link_records(&self.job_table, &self.job_user_link_field, record_id, user_id)
            .await
    }

    pub async fn is_job_linked_to_user(
        &self,
        record_id: i64,
        user_id: i64,
    ) -> Result<bool, AppError> {
        let linked = self
            .store
            .linked_records(&self.job_table, &self.job_user_link_field, record_id)
            .await?;
        Ok(linked.iter().any(|record| id_matches(record, user_id)))
    }

    /// Authorization rule: a linked job is visible to its linking user only;
    /// an unlinked job (legacy/unauthenticated flow) is visible to anyone.
    pub async fn job_visible_to(
        &self,
        record_id: i64,
        user_id: Option<i64>,
    ) -> Result<bool, AppError> {
        let linked = self
            .store
            .linked_records(&self.job_table, &self.job_user_link_field, record_id)
            .await?;
        if linked.is_empty() {
            return Ok(true);
        }
        Ok(user_id.is_some_and(|uid| linked.iter().any(|record| id_matches(record, uid))))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let record = self
            .store
            .find_record(&self.user_table, "email", email)
            .await?;
        record.map(User::from_value).transpose()
    }
}

/// Linked-record ids arrive as numbers or strings depending on deployment;
/// compare both ways.
fn id_matches(record: &Value, user_id: i64) -> bool {
    match record.get("Id") {
        Some(Value::Number(n)) => n.as_i64() == Some(user_id),
        Some(Value::String(s)) => s == &user_id.to_string(),
        _ => false,
    }
}
