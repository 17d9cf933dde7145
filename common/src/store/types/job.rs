use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Placeholder written into `input_text` while the OCR service is still
/// working on an uploaded document.
pub const OCR_PLACEHOLDER_TEXT: &str =
    "Document submitted for OCR processing. Results will be available soon.";

/// Sentences that mark `input_text` as a placeholder rather than real
/// extracted text.
const PLACEHOLDER_MARKERS: [&str; 4] = [
    "OCR processing in progress",
    "Document submitted for OCR processing",
    "Wait for OCR to complete",
    "Results will be available soon",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }
}

/// One document or text submission tracked through OCR and anonymization.
///
/// `record_id` is the store-assigned primary key; `internal_id` is the
/// client-assigned UUID used in user-facing URLs so the primary key stays
/// hidden.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "Id")]
    pub record_id: i64,
    #[serde(rename = "internal_ID", default, deserialize_with = "empty_if_null")]
    pub internal_id: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub input_text: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub output_text: String,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub full_prefix_text: String,
    #[serde(default, deserialize_with = "none_if_empty")]
    pub language: Option<String>,
}

fn empty_if_null<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn none_if_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.filter(|s| !s.trim().is_empty()))
}

impl Job {
    pub fn from_value(value: Value) -> Result<Self, AppError> {
        serde_json::from_value(value)
            .map_err(|e| AppError::StoreUnavailable(format!("malformed job record: {e}")))
    }

    /// A non-empty `output_text` is the completion signal. The stored status
    /// column is never trusted over this rule.
    pub fn is_complete(&self) -> bool {
        !self.output_text.trim().is_empty()
    }

    pub fn status(&self) -> JobStatus {
        if self.is_complete() {
            JobStatus::Complete
        } else {
            JobStatus::Processing
        }
    }

    /// True once `input_text` holds actual extracted text rather than the
    /// OCR placeholder sentence.
    pub fn has_real_input(&self) -> bool {
        let text = self.input_text.trim();
        !text.is_empty() && !PLACEHOLDER_MARKERS.iter().any(|marker| text.contains(marker))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_record_with_null_fields() {
        let job = Job::from_value(json!({
            "Id": 42,
            "internal_ID": "8e7f1c2a-0000-4000-8000-123456789abc",
            "input_text": null,
            "output_text": null,
            "language": null
        }))
        .expect("job parses");

        assert_eq!(job.record_id, 42);
        assert!(job.input_text.is_empty());
        assert!(!job.is_complete());
        assert_eq!(job.status(), JobStatus::Processing);
        assert_eq!(job.language, None);
    }

    #[test]
    fn completion_follows_output_presence() {
        let mut job = Job::from_value(json!({"Id": 1})).expect("job parses");
        assert!(!job.is_complete());

        job.output_text = "{%{Email-a1b2c3d4}%}".to_string();
        assert!(job.is_complete());
        assert_eq!(job.status(), JobStatus::Complete);
    }

    #[test]
    fn placeholder_input_is_not_real() {
        let job = Job::from_value(json!({
            "Id": 5,
            "input_text": OCR_PLACEHOLDER_TEXT
        }))
        .expect("job parses");
        assert!(!job.has_real_input());

        let job = Job::from_value(json!({
            "Id": 6,
            "input_text": "Max Mustermann wohnt in Berlin."
        }))
        .expect("job parses");
        assert!(job.has_real_input());
    }

    #[test]
    fn blank_language_reads_as_none() {
        let job = Job::from_value(json!({"Id": 7, "language": "  "})).expect("job parses");
        assert_eq!(job.language, None);

        let job = Job::from_value(json!({"Id": 8, "language": "de"})).expect("job parses");
        assert_eq!(job.language.as_deref(), Some("de"));
    }
}
