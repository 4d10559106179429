//! The payment handshake: one tool call from proposal to resolution.
//!
//! Two suspension points wait on the user — approving the call itself, and
//! confirming a payment once the tool demands one. Both are bounded by a
//! decision timeout, and a timeout resolves exactly like a decline. After a
//! confirmed payment the invocation is retried exactly once with the signed
//! credential; anything but success on that retry resolves as failure rather
//! than looping.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::DEFAULT_DECISION_TIMEOUT_SECS;
use crate::error::{PaymentError, Result};
use crate::gateway::{self, InvokeOutcome};
use crate::types::{PaymentRequirement, PendingToolCall, ToolDef};
use crate::wallet::{WalletSigner, validity_deadline};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeState {
    Idle,
    AwaitingApproval,
    Executing,
    AwaitingPayment,
    PaymentInFlight,
    Retrying,
    Resolved,
}

/// How a handshake ended. User declines are outcomes, not errors.
#[derive(Clone, Debug, PartialEq)]
pub enum HandshakeOutcome {
    Success(serde_json::Value),
    /// The user declined the call (or the approval timed out).
    Denied,
    /// The user cancelled the payment (or the confirmation timed out).
    PaymentCancelled,
    /// A credential could not be produced for a confirmed payment.
    PaymentFailed(String),
    /// The credentialed retry did not succeed.
    Failed(String),
}

/// The user-facing side of the handshake. Both methods may take arbitrarily
/// long; the handshake bounds them with its decision timeout.
#[async_trait]
pub trait UserPrompt: Send + Sync {
    /// Should this tool call run at all?
    async fn approve_call(&self, call: &PendingToolCall, tool: &ToolDef) -> bool;

    /// The tool demands payment — pay it?
    async fn confirm_payment(&self, call: &PendingToolCall, requirement: &PaymentRequirement)
    -> bool;
}

pub struct Handshake {
    state: Mutex<HandshakeState>,
    pending: Mutex<Option<PendingToolCall>>,
    decision_timeout: Duration,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new()
    }
}

impl Handshake {
    pub fn new() -> Self {
        Self::with_decision_timeout(Duration::from_secs(DEFAULT_DECISION_TIMEOUT_SECS))
    }

    pub fn with_decision_timeout(decision_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(HandshakeState::Idle),
            pending: Mutex::new(None),
            decision_timeout,
        }
    }

    /// Current phase, for UIs polling a suspended call.
    pub fn state(&self) -> HandshakeState {
        *self.state.lock().unwrap()
    }

    /// The suspended call, while one is in flight.
    pub fn pending(&self) -> Option<PendingToolCall> {
        self.pending.lock().unwrap().clone()
    }

    fn enter(&self, state: HandshakeState) {
        *self.state.lock().unwrap() = state;
    }

    async fn decide<F>(&self, what: &str, decision: F) -> bool
    where
        F: Future<Output = bool>,
    {
        match tokio::time::timeout(self.decision_timeout, decision).await {
            Ok(approved) => approved,
            Err(_) => {
                warn!("{what} decision timed out after {:?}", self.decision_timeout);
                false
            }
        }
    }

    /// Drive one tool call to resolution.
    pub async fn run(
        &self,
        tool: &ToolDef,
        input: serde_json::Value,
        prompt: &dyn UserPrompt,
        signer: &dyn WalletSigner,
    ) -> Result<HandshakeOutcome> {
        let call = PendingToolCall {
            tool_call_id: uuid::Uuid::new_v4().to_string(),
            tool_id: tool.id.clone(),
            input: input.clone(),
            requirements: None,
        };
        *self.pending.lock().unwrap() = Some(call.clone());

        let result = self.run_inner(call, tool, input, prompt, signer).await;

        // Every resolution drops the suspended call.
        *self.pending.lock().unwrap() = None;
        self.enter(HandshakeState::Resolved);
        result
    }

    async fn run_inner(
        &self,
        mut call: PendingToolCall,
        tool: &ToolDef,
        input: serde_json::Value,
        prompt: &dyn UserPrompt,
        signer: &dyn WalletSigner,
    ) -> Result<HandshakeOutcome> {
        self.enter(HandshakeState::AwaitingApproval);
        if !self.decide("call approval", prompt.approve_call(&call, tool)).await {
            info!("call {} to {} denied", call.tool_call_id, tool.name);
            return Ok(HandshakeOutcome::Denied);
        }

        self.enter(HandshakeState::Executing);
        let requirement = match gateway::invoke(&tool.api_url, &input, None).await? {
            InvokeOutcome::Success(data) => return Ok(HandshakeOutcome::Success(data)),
            InvokeOutcome::PaymentRequired(requirement) => requirement,
        };

        call.requirements = Some(requirement.clone());
        *self.pending.lock().unwrap() = Some(call.clone());

        self.enter(HandshakeState::AwaitingPayment);
        if !self
            .decide("payment", prompt.confirm_payment(&call, &requirement))
            .await
        {
            info!("payment for call {} cancelled", call.tool_call_id);
            return Ok(HandshakeOutcome::PaymentCancelled);
        }

        self.enter(HandshakeState::PaymentInFlight);
        let credential = match signer.payment_header(&requirement, validity_deadline()).await {
            Ok(credential) => credential,
            Err(err) => {
                warn!("signing failed for call {}: {err}", call.tool_call_id);
                return Ok(HandshakeOutcome::PaymentFailed(err.to_string()));
            }
        };

        // Exactly one credentialed retry. Anything but success resolves the
        // handshake; only a malformed demand stays a hard error.
        self.enter(HandshakeState::Retrying);
        match gateway::invoke(&tool.api_url, &input, Some(&credential)).await {
            Ok(InvokeOutcome::Success(data)) => Ok(HandshakeOutcome::Success(data)),
            Ok(InvokeOutcome::PaymentRequired(_)) => Ok(HandshakeOutcome::Failed(
                "payment not accepted: tool demanded payment again".to_string(),
            )),
            Err(err @ PaymentError::MalformedDemand(_)) => Err(err),
            Err(err) => Ok(HandshakeOutcome::Failed(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{MockSigner, ScriptedPrompt};

    fn tool() -> ToolDef {
        ToolDef {
            id: "tool-1".to_string(),
            name: "summarizer".to_string(),
            description: None,
            api_url: "http://127.0.0.1:1".to_string(),
            price: 0.5,
            input_schema: None,
            output_schema: None,
        }
    }

    #[tokio::test]
    async fn denial_resolves_without_invoking_the_tool() {
        // api_url points nowhere; a denial must resolve before any request.
        let handshake = Handshake::new();
        let prompt = ScriptedPrompt::deny_call();
        let signer = MockSigner::new();

        let outcome = handshake
            .run(&tool(), serde_json::json!({}), &prompt, &signer)
            .await
            .unwrap();
        assert_eq!(outcome, HandshakeOutcome::Denied);
        assert_eq!(handshake.state(), HandshakeState::Resolved);
        assert!(handshake.pending().is_none());
        assert!(signer.signed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn approval_timeout_resolves_like_a_denial() {
        let handshake = Handshake::with_decision_timeout(Duration::from_millis(10));
        let prompt = ScriptedPrompt::hang();
        let signer = MockSigner::new();

        let outcome = handshake
            .run(&tool(), serde_json::json!({}), &prompt, &signer)
            .await
            .unwrap();
        assert_eq!(outcome, HandshakeOutcome::Denied);
    }

    #[tokio::test]
    async fn fresh_handshake_is_idle() {
        let handshake = Handshake::new();
        assert_eq!(handshake.state(), HandshakeState::Idle);
        assert!(handshake.pending().is_none());
    }
}
