use once_cell::sync::OnceCell;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, StatusCode, Url};
use serde_json::Value;

use crate::config::RuntimeConfig;
use crate::error::{DeployError, Result};

static HTTP_CLIENT: OnceCell<Client> = OnceCell::new();

pub fn http_client() -> Result<&'static Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(RuntimeConfig::load().request_timeout)
            .build()
            .map_err(|err| DeployError::Http(format!("Failed to build HTTP client: {err}")))
    })
}

pub fn build_url(base: &str, path: &str) -> Result<Url> {
    let base_url =
        Url::parse(base).map_err(|err| DeployError::Http(format!("Invalid base URL: {err}")))?;
    base_url
        .join(path)
        .map_err(|err| DeployError::Http(format!("Invalid path '{path}': {err}")))
}

pub fn auth_headers(token: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    let value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|_| DeployError::Http("Invalid auth token".into()))?;
    headers.insert(AUTHORIZATION, value);

    Ok(headers)
}

pub async fn send_json(
    method: Method,
    url: Url,
    body: Option<Value>,
    headers: HeaderMap,
) -> Result<(StatusCode, String)> {
    let client = http_client()?;
    let mut request = client.request(method, url).headers(headers);
    if let Some(body) = body {
        request = request.json(&body);
    }

    let response = request
        .send()
        .await
        .map_err(|err| DeployError::Http(format!("HTTP request failed: {err}")))?;
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|err| DeployError::Http(format!("Failed to read response body: {err}")))?;

    if !status.is_success() {
        return Err(DeployError::Http(format!("HTTP {status}: {text}")));
    }

    Ok((status, text))
}

/// POST a JSON payload to the provider API and parse the JSON response.
pub async fn provider_post_json(
    base: &str,
    path: &str,
    token: &str,
    payload: Value,
) -> Result<Value> {
    let url = build_url(base, path)?;
    let headers = auth_headers(token)?;
    let (_, body) = send_json(Method::POST, url, Some(payload), headers).await?;
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|err| DeployError::Http(format!("Invalid provider response JSON: {err}")))
}

/// GET a provider API path and parse the JSON response.
pub async fn provider_get_json(base: &str, path: &str, token: &str) -> Result<Value> {
    let url = build_url(base, path)?;
    let headers = auth_headers(token)?;
    let (_, body) = send_json(Method::GET, url, None, headers).await?;
    serde_json::from_str(&body)
        .map_err(|err| DeployError::Http(format!("Invalid provider response JSON: {err}")))
}
