use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use delivery_metrics_core::error::{DeliveryError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("delivery-metrics-exporter/", env!("CARGO_PKG_VERSION"));
/// Upper bound on how much of an error body ends up in a log line.
const MAX_ERROR_BODY: usize = 256;

pub(crate) fn build_client(service: &'static str) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| DeliveryError::Internal(format!("{service} http client: {e}")))
}

/// Send `req`, require a 2xx, and decode the JSON body.
pub(crate) async fn send_json<T: DeserializeOwned>(
    service: &'static str,
    what: &str,
    req: RequestBuilder,
) -> Result<(T, HeaderMap)> {
    let resp = req
        .send()
        .await
        .map_err(|e| DeliveryError::upstream(service, format!("{what}: {e}")))?;

    let status = resp.status();
    let headers = resp.headers().clone();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let body: String = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(DeliveryError::upstream(
            service,
            format!("{what}: status {status}: {}", body.trim()),
        ));
    }

    let value = resp
        .json::<T>()
        .await
        .map_err(|e| DeliveryError::upstream(service, format!("{what}: invalid response body: {e}")))?;
    Ok((value, headers))
}
