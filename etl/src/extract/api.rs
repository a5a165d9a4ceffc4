//! Stores REST API client.
//!
//! The API exposes a store count and one detail record per store number:
//!
//! ```text
//! GET number_stores          ──▶ {"number_stores": N}
//! GET store_details/{0..N}   ──▶ {"store_code": ..., ...}  x N
//! ```
//!
//! Every response is checked against the embedded JSON schemas before it
//! becomes a row.

use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::StoresApiConfig;
use crate::error::{ExtractError, ExtractResult};
use crate::table::Table;
use crate::validation::{validate_store_count, validate_store_details};

/// Placeholder replaced by the store number in the details URL.
pub const STORE_NUMBER_PLACEHOLDER: &str = "{store_number}";

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

/// Client for the stores API.
#[derive(Clone)]
pub struct StoresApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    number_of_stores_url: String,
    store_details_url: String,
    max_retries: u32,
}

impl StoresApiClient {
    pub fn new(config: &StoresApiConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            number_of_stores_url: config.number_of_stores_url.clone(),
            store_details_url: config.store_details_url.clone(),
            max_retries: config.max_retries.max(1),
        }
    }

    /// Number of stores to fetch.
    pub async fn number_of_stores(&self) -> ExtractResult<u64> {
        let body = self.get_json(&self.number_of_stores_url).await?;
        store_count(&body)
    }

    /// Detail record of one store.
    pub async fn store_details(&self, store_number: u64) -> ExtractResult<Value> {
        let url = details_url(&self.store_details_url, store_number);
        let body = self.get_json(&url).await?;
        validate_store_details(&body).map_err(|errors| {
            ExtractError::Precondition(format!(
                "store {} response does not match the store schema: {}",
                store_number,
                errors.join("; ")
            ))
        })?;
        Ok(body)
    }

    /// Fetch every store into a raw table, one row per store number.
    pub async fn fetch_stores(&self) -> ExtractResult<Table> {
        let count = self.number_of_stores().await?;
        info!(count, "fetching store details");

        let mut records = Vec::with_capacity(count as usize);
        for store_number in 0..count {
            records.push(self.store_details(store_number).await?);
            if (store_number + 1) % 100 == 0 {
                debug!(fetched = store_number + 1, total = count, "store details progress");
            }
        }
        Ok(Table::from_records(&records))
    }

    /// GET with retries on transport errors and 5xx responses.
    async fn get_json(&self, url: &str) -> ExtractResult<Value> {
        let mut attempt = 1;
        loop {
            match self.try_get_json(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    warn!(url, attempt, max = self.max_retries, error = %e, "request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_get_json(&self, url: &str) -> ExtractResult<Value> {
        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::UNAUTHORIZED {
            return Err(ExtractError::Precondition(format!(
                "stores API rejected the API key (HTTP {})",
                status
            )));
        }
        let response = response.error_for_status()?;
        Ok(response.json::<Value>().await?)
    }
}

fn is_retryable(error: &ExtractError) -> bool {
    match error {
        ExtractError::Http(e) => e.status().map_or(true, |s| s.is_server_error()),
        _ => false,
    }
}

/// Substitute the store number into the details URL template. A template
/// without the placeholder gets the number appended as a path segment.
pub fn details_url(template: &str, store_number: u64) -> String {
    if template.contains(STORE_NUMBER_PLACEHOLDER) {
        template.replace(STORE_NUMBER_PLACEHOLDER, &store_number.to_string())
    } else {
        format!("{}/{}", template.trim_end_matches('/'), store_number)
    }
}

/// Read the store count out of a `number_stores` response.
pub fn store_count(body: &Value) -> ExtractResult<u64> {
    validate_store_count(body).map_err(|errors| {
        ExtractError::Precondition(format!(
            "number of stores response does not match its schema: {}",
            errors.join("; ")
        ))
    })?;
    body["number_stores"]
        .as_u64()
        .ok_or_else(|| ExtractError::Precondition("number_stores is not an integer".into()))
}
