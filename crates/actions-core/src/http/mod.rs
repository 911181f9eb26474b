//! reqwest-backed adapters for services reached over plain HTTPS.

pub mod neptune;
pub mod tavily;

use crate::error::{ActionError, Result};
use std::time::Duration;

pub(crate) fn client(service: &'static str, timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ActionError::backend(service, e))
}

/// Turn a non-2xx response into a backend error carrying the response text.
pub(crate) async fn check_status(
    service: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(ActionError::backend(
        service,
        format!("HTTP {}: {}", status.as_u16(), text.trim()),
    ))
}
