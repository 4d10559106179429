//! Invocation Gateway: one stateless `POST {apiURL}/send` and the x402
//! classification of its response.
//!
//! A 402 is only honored when it carries a decodable `X-PAYMENT-REQUIRED`
//! header. A bare 402 means the tool is misconfigured, not that the caller
//! should pay — that case is a hard [`PaymentError::MalformedDemand`] and
//! must never be retried with a credential.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::OnceCell;
use reqwest::StatusCode;
use tracing::{debug, info};

use crate::error::{PaymentError, Result};
use crate::types::{PaymentRequirement, ToolDef, ToolExecutionResult};
use crate::{PAYMENT_HEADER, PAYMENT_REQUIRED_HEADER};

/// What one invocation resolved to.
#[derive(Clone, Debug)]
pub enum InvokeOutcome {
    Success(serde_json::Value),
    PaymentRequired(PaymentRequirement),
}

impl InvokeOutcome {
    /// The status-tagged shape handed back to agent clients.
    pub fn into_execution_result(self, tool: &ToolDef) -> ToolExecutionResult {
        match self {
            InvokeOutcome::Success(data) => ToolExecutionResult::Success { data },
            InvokeOutcome::PaymentRequired(requirements) => ToolExecutionResult::PaymentRequired {
                requirements,
                tool_id: tool.id.clone(),
                price: tool.price,
            },
        }
    }
}

static HTTP_CLIENT: OnceCell<reqwest::Client> = OnceCell::new();

fn http_client() -> Result<&'static reqwest::Client> {
    HTTP_CLIENT.get_or_try_init(|| {
        reqwest::Client::builder()
            .build()
            .map_err(|err| PaymentError::Http(format!("build http client: {err}")))
    })
}

fn decode_requirement(header: &str) -> Result<PaymentRequirement> {
    let raw = BASE64
        .decode(header)
        .map_err(|err| PaymentError::MalformedDemand(format!("invalid base64: {err}")))?;
    serde_json::from_slice(&raw)
        .map_err(|err| PaymentError::MalformedDemand(format!("invalid requirement JSON: {err}")))
}

/// Invoke a tool once. `payment` is the signed credential for the retry leg,
/// absent on the first attempt.
pub async fn invoke(
    api_url: &str,
    input: &serde_json::Value,
    payment: Option<&str>,
) -> Result<InvokeOutcome> {
    let url = format!("{}/send", api_url.trim_end_matches('/'));
    let mut request = http_client()?.post(&url).json(input);
    if let Some(credential) = payment {
        debug!("invoking {url} with payment credential");
        request = request.header(PAYMENT_HEADER, credential);
    }

    let response = request
        .send()
        .await
        .map_err(|err| PaymentError::Http(format!("POST {url}: {err}")))?;

    if response.status() == StatusCode::PAYMENT_REQUIRED {
        let Some(header) = response.headers().get(PAYMENT_REQUIRED_HEADER) else {
            return Err(PaymentError::MalformedDemand(
                "402 without payment requirements".to_string(),
            ));
        };
        let header = header.to_str().map_err(|err| {
            PaymentError::MalformedDemand(format!("unreadable requirement header: {err}"))
        })?;
        let requirement = decode_requirement(header)?;
        info!(
            "{url} demands payment: {} to {}",
            requirement.max_amount_required, requirement.pay_to
        );
        return Ok(InvokeOutcome::PaymentRequired(requirement));
    }

    if !response.status().is_success() {
        return Err(PaymentError::Invocation(format!(
            "{url} returned {}",
            response.status()
        )));
    }

    let data = response
        .json::<serde_json::Value>()
        .await
        .map_err(|err| PaymentError::Invocation(format!("{url} returned malformed body: {err}")))?;
    Ok(InvokeOutcome::Success(data))
}
