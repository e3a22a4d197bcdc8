//! One-shot REST helper
//!
//! Used for symbol listings and 24h volume ranking, where a single JSON
//! document is fetched before the live session starts.

use serde::de::DeserializeOwned;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// GET `url` and decode the JSON body into `T`
pub async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> ExchangeResult<T> {
    let started = std::time::Instant::now();
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| ExchangeError::Http(format!("GET {}: {}", url, e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExchangeError::Http(format!("GET {} returned {}", url, status)));
    }

    let body = response
        .json::<T>()
        .await
        .map_err(|e| ExchangeError::InvalidResponse(format!("GET {}: {}", url, e)))?;

    tracing::debug!(url, latency_ms = started.elapsed().as_millis() as u64, "REST fetch complete");
    Ok(body)
}
