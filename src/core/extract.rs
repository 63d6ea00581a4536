use crate::core::RawRecord;
use crate::domain::model::EntityKind;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Fetches whole collections from the REST API. One GET per collection, no retries.
#[derive(Debug, Clone)]
pub struct HttpExtractor {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpExtractor {
    pub fn new(base_url: &str, timeout_seconds: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub fn endpoint(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.collection())
    }

    /// Returns the raw JSON array exactly as served.
    pub async fn fetch(&self, kind: EntityKind) -> Result<Vec<Value>> {
        let url = self.endpoint(kind);
        tracing::info!("📡 Fetching {} from {}", kind.collection(), url);

        let response = self.client.get(&url).timeout(self.timeout).send().await?;
        let status = response.status();
        tracing::debug!("📡 API response status: {}", status);

        if !status.is_success() {
            tracing::error!("❌ Failed to fetch {}: HTTP {}", url, status);
            return Err(EtlError::ApiStatusError {
                url,
                status: status.as_u16(),
            });
        }

        match response.json::<Value>().await? {
            Value::Array(items) => {
                tracing::info!("📡 Fetched {} {} from API", items.len(), kind.collection());
                Ok(items)
            }
            other => Err(EtlError::ProcessingError {
                message: format!(
                    "Expected a JSON array from {}, got {}",
                    url,
                    json_type_name(&other)
                ),
            }),
        }
    }
}

/// One record per raw array item, in array order. A non-object item becomes
/// an empty record, so the batch driver rejects it at its original index.
pub fn into_raw_records(items: Vec<Value>, kind: EntityKind) -> Vec<RawRecord> {
    let mut non_objects = 0;
    let records: Vec<RawRecord> = items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let type_name = json_type_name(&item);
            RawRecord::from_value(item).unwrap_or_else(|| {
                tracing::warn!(
                    "⚠️ {} item {} is a JSON {}, not an object",
                    kind,
                    index,
                    type_name
                );
                non_objects += 1;
                RawRecord::default()
            })
        })
        .collect();

    if non_objects > 0 {
        tracing::warn!(
            "⚠️ {} of {} raw {} items were not objects",
            non_objects,
            records.len(),
            kind.collection()
        );
    }
    records
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
