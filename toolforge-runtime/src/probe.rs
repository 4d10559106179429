//! Post-launch schema probe.
//!
//! Deployed workloads self-describe at `GET /schema`. The probe waits out a
//! startup grace period, then issues one bounded request. It is intentionally
//! non-fatal: any failure falls back to the statically parsed metadata.

use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::http::http_client;

/// Authoritative price/schema recovered from a running workload.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ToolSchema {
    pub price: Option<f64>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
    #[serde(rename = "outputSchema")]
    pub output_schema: Option<serde_json::Value>,
}

/// Query `{base_url}/schema` once after `settle`, with `timeout` bounding the
/// request. Timeouts, non-2xx responses, and malformed bodies all yield
/// `None`.
pub async fn probe_schema(base_url: &str, settle: Duration, timeout: Duration) -> Option<ToolSchema> {
    tokio::time::sleep(settle).await;

    let url = format!("{}/schema", base_url.trim_end_matches('/'));
    let client = match http_client() {
        Ok(client) => client,
        Err(err) => {
            warn!("schema probe skipped: {err}");
            return None;
        }
    };

    let response = match client.get(&url).timeout(timeout).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!("schema probe failed for {url}: {err}");
            return None;
        }
    };

    if !response.status().is_success() {
        warn!("schema probe for {url} returned {}", response.status());
        return None;
    }

    match response.json::<ToolSchema>().await {
        Ok(schema) => {
            info!("schema probe for {url} succeeded (price: {:?})", schema.price);
            Some(schema)
        }
        Err(err) => {
            warn!("schema probe for {url} returned malformed body: {err}");
            None
        }
    }
}
