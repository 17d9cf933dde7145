use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{error::AppError, utils::config::AppConfig};

const STORE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Typed CRUD access to the external record store. The trait is the seam the
/// gateway is tested through; [`HttpRecordStore`] is the production
/// implementation. Implementations return *normalized* records: response
/// shape quirks (nested `data`, `list` wrappers) never leave this module.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create_record(&self, table: &str, fields: Value) -> Result<Value, AppError>;
    async fn get_record(&self, table: &str, id: i64) -> Result<Value, AppError>;
    async fn find_record(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, AppError>;
    async fn update_record(&self, table: &str, id: i64, fields: Value) -> Result<(), AppError>;
    async fn link_records(
        &self,
        table: &str,
        link_field: &str,
        id: i64,
        target_id: i64,
    ) -> Result<(), AppError>;
    async fn linked_records(
        &self,
        table: &str,
        link_field: &str,
        id: i64,
    ) -> Result<Vec<Value>, AppError>;
}

/// Record store client speaking the hosted store's HTTP+JSON dialect: token
/// header on every call, table-scoped record endpoints, and a link
/// sub-resource for relations.
pub struct HttpRecordStore {
    client: reqwest::Client,
    base_url: String,
    token_header: String,
    token: String,
}

impl HttpRecordStore {
    pub fn new(config: &AppConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(STORE_REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.store_base_url.trim_end_matches('/').to_string(),
            token_header: config.store_token_header.clone(),
            token: config.store_token.clone(),
        })
    }

    fn records_url(&self, table: &str) -> String {
        format!("{}/tables/{}/records", self.base_url, table)
    }

    fn links_url(&self, table: &str, link_field: &str, id: i64) -> String {
        format!(
            "{}/tables/{}/links/{}/records/{}",
            self.base_url, table, link_field, id
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header(self.token_header.as_str(), self.token.as_str())
    }
}

/// Single-record responses are nested under a `data` key on some deployments
/// and returned bare on others; callers must accept both shapes.
fn unwrap_record(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// List responses arrive as `{list: [..]}`, `{data: {list: [..]}}` or a bare
/// array depending on the deployment.
fn unwrap_list(value: Value) -> Vec<Value> {
    match unwrap_record(value) {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// Link lookups additionally return a bare record when exactly one row is
/// linked.
fn unwrap_linked(value: Value) -> Vec<Value> {
    match unwrap_record(value) {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => items,
            _ if map.contains_key("Id") => vec![Value::Object(map)],
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn snippet(body: &str) -> String {
    body.chars().take(200).collect()
}

#[async_trait]
impl RecordStore for HttpRecordStore {
    async fn create_record(&self, table: &str, fields: Value) -> Result<Value, AppError> {
        let response = self
            .request(self.client.post(self.records_url(table)))
            .json(&fields)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("create on {table}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "create on {table}: {status} {}",
                snippet(&body)
            )));
        }
        Ok(unwrap_record(response.json::<Value>().await?))
    }

    async fn get_record(&self, table: &str, id: i64) -> Result<Value, AppError> {
        let url = format!("{}/{}", self.records_url(table), id);
        let response = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("get {table}/{id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "get {table}/{id}: {status} {}",
                snippet(&body)
            )));
        }
        Ok(unwrap_record(response.json::<Value>().await?))
    }

    async fn find_record(
        &self,
        table: &str,
        field: &str,
        value: &str,
    ) -> Result<Option<Value>, AppError> {
        let where_param = format!("({field},eq,{value})");
        let response = self
            .request(self.client.get(self.records_url(table)))
            .query(&[("where", where_param.as_str()), ("limit", "1")])
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("filter on {table}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "filter on {table}: {status} {}",
                snippet(&body)
            )));
        }
        let records = unwrap_list(response.json::<Value>().await?);
        Ok(records.into_iter().next())
    }

    async fn update_record(&self, table: &str, id: i64, fields: Value) -> Result<(), AppError> {
        // All mutated fields travel in one call; the store has no transactions
        // so a single request minimizes the window where partial state is
        // visible.
        let mut body = fields;
        if let Value::Object(map) = &mut body {
            map.insert("Id".to_string(), json!(id));
        }

        // Primary shape: bulk PATCH with the Id carried in the body.
        match self
            .request(self.client.patch(self.records_url(table)))
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => return Ok(()),
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                warn!(
                    table,
                    id,
                    %status,
                    body = %snippet(&text),
                    "patch update rejected, retrying with record-path shape"
                );
            }
            Err(e) => {
                warn!(table, id, error = %e, "patch update failed, retrying with record-path shape");
            }
        }

        // Alternate shape some deployments require: POST to the record path.
        let url = format!("{}/{}", self.records_url(table), id);
        let response = self
            .request(self.client.post(url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("update {table}/{id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "update {table}/{id}: {status} {}",
                snippet(&text)
            )));
        }
        Ok(())
    }

    async fn link_records(
        &self,
        table: &str,
        link_field: &str,
        id: i64,
        target_id: i64,
    ) -> Result<(), AppError> {
        let url = self.links_url(table, link_field, id);
        let response = self
            .request(self.client.post(url))
            .json(&json!([{ "Id": target_id }]))
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("link {table}/{id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "link {table}/{id}: {status} {}",
                snippet(&text)
            )));
        }
        debug!(table, id, target_id, "linked records");
        Ok(())
    }

    async fn linked_records(
        &self,
        table: &str,
        link_field: &str,
        id: i64,
    ) -> Result<Vec<Value>, AppError> {
        let url = self.links_url(table, link_field, id);
        let response = self
            .request(self.client.get(url))
            .send()
            .await
            .map_err(|e| AppError::StoreUnavailable(format!("links of {table}/{id}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::StoreUnavailable(format!(
                "links of {table}/{id}: {status} {}",
                snippet(&text)
            )));
        }
        Ok(unwrap_linked(response.json::<Value>().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unwrap_record_handles_nested_data_shape() {
        let nested = json!({"data": {"Id": 42, "internal_ID": "abc"}});
        let record = unwrap_record(nested);
        assert_eq!(record["Id"], 42);
        assert_eq!(record["internal_ID"], "abc");
    }

    #[test]
    fn unwrap_record_passes_bare_shape_through() {
        let bare = json!({"Id": 7, "output_text": "done"});
        assert_eq!(unwrap_record(bare.clone()), bare);
    }

    #[test]
    fn unwrap_list_handles_all_three_shapes() {
        let wrapped = json!({"list": [{"Id": 1}]});
        let nested = json!({"data": {"list": [{"Id": 2}]}});
        let bare = json!([{"Id": 3}]);

        assert_eq!(unwrap_list(wrapped)[0]["Id"], 1);
        assert_eq!(unwrap_list(nested)[0]["Id"], 2);
        assert_eq!(unwrap_list(bare)[0]["Id"], 3);
    }

    #[test]
    fn unwrap_list_of_empty_result_is_empty() {
        assert!(unwrap_list(json!({"list": []})).is_empty());
        assert!(unwrap_list(json!({})).is_empty());
        assert!(unwrap_list(Value::Null).is_empty());
    }

    #[test]
    fn unwrap_linked_accepts_single_record_shape() {
        let single = json!({"Id": 9, "email": "a@b.c"});
        let linked = unwrap_linked(single);
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0]["Id"], 9);
    }

    #[test]
    fn unwrap_linked_accepts_list_and_array_shapes() {
        assert_eq!(unwrap_linked(json!({"list": [{"Id": 1}, {"Id": 2}]})).len(), 2);
        assert_eq!(unwrap_linked(json!([{"Id": 1}])).len(), 1);
        assert!(unwrap_linked(json!({})).is_empty());
    }
}
