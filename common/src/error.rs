use thiserror::Error;
use uuid::Uuid;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Record store error: {0}")]
    StoreUnavailable(String),
    #[error("Webhook error: {0}")]
    WebhookUnavailable(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Internal service error: {0}")]
    Internal(String),
}

/// Short opaque identifier attached to sanitized error responses so a support
/// request can be correlated with the server logs.
pub fn error_id() -> String {
    Uuid::new_v4().to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_id_is_short_and_hex() {
        let id = error_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn error_ids_are_unique_enough() {
        assert_ne!(error_id(), error_id());
    }
}
