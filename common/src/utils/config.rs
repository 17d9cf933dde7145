use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    /// Base URL of the record store API, e.g. `https://store.example/api/v2`.
    pub store_base_url: String,
    pub store_token: String,
    #[serde(default = "default_store_token_header")]
    pub store_token_header: String,
    #[serde(default = "default_job_table")]
    pub job_table: String,
    #[serde(default = "default_user_table")]
    pub user_table: String,
    /// Link-field id of the job -> user relation in the record store.
    #[serde(default = "default_job_user_link_field")]
    pub job_user_link_field: String,
    pub processing_webhook_url: String,
    pub api_webhook_url: String,
    pub raw_text_webhook_url: String,
    pub ocr_webhook_url: String,
    pub auth_email_webhook_url: String,
    pub http_port: u16,
    #[serde(default = "default_upload_max_bytes")]
    pub upload_max_bytes: usize,
}

fn default_store_token_header() -> String {
    "xc-token".to_string()
}

fn default_job_table() -> String {
    "job".to_string()
}

fn default_user_table() -> String {
    "user".to_string()
}

fn default_job_user_link_field() -> String {
    "job_user".to_string()
}

fn default_upload_max_bytes() -> usize {
    10 * 1024 * 1024
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    let config: AppConfig = config.try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let urls = [
        ("store_base_url", &config.store_base_url),
        ("processing_webhook_url", &config.processing_webhook_url),
        ("api_webhook_url", &config.api_webhook_url),
        ("raw_text_webhook_url", &config.raw_text_webhook_url),
        ("ocr_webhook_url", &config.ocr_webhook_url),
        ("auth_email_webhook_url", &config.auth_email_webhook_url),
    ];
    for (name, value) in urls {
        url::Url::parse(value)
            .map_err(|e| ConfigError::Message(format!("invalid {name} '{value}': {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn minimal_config() -> AppConfig {
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
        .expect("minimal config deserializes")
    }

    #[test]
    fn defaults_are_applied() {
        let config = minimal_config();
        assert_eq!(config.store_token_header, "xc-token");
        assert_eq!(config.job_table, "job");
        assert_eq!(config.user_table, "user");
        assert_eq!(config.upload_max_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn validate_accepts_minimal_config() {
        assert!(validate(&minimal_config()).is_ok());
    }

    #[test]
    fn validate_rejects_malformed_webhook_url() {
        let mut config = minimal_config();
        config.ocr_webhook_url = "not a url".to_string();
        assert!(validate(&config).is_err());
    }
}
