//! Wire types shared by the gateway and the handshake.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A deployed tool as listed by the registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "apiURL")]
    pub api_url: String,
    pub price: f64,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
}

/// The payment demand carried in a 402's `X-PAYMENT-REQUIRED` header.
///
/// Only the payee and amount matter to us; whatever else the facilitator puts
/// in the demand is kept opaque and echoed through to the signer.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirement {
    pub pay_to: String,
    pub max_amount_required: String,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Outcome of a single tool execution, in the tool server's own tagging.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolExecutionResult {
    PaymentRequired {
        requirements: PaymentRequirement,
        #[serde(rename = "toolId")]
        tool_id: String,
        price: f64,
    },
    Success {
        data: serde_json::Value,
    },
}

/// A call suspended mid-handshake, waiting on a user decision.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingToolCall {
    pub tool_call_id: String,
    pub tool_id: String,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<PaymentRequirement>,
}
