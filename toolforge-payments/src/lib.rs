//! Payment-gated tool invocation.
//!
//! Deployed tools answer `POST /send` either with a result or with an x402
//! challenge: HTTP 402 plus a base64 `X-PAYMENT-REQUIRED` header describing
//! what to pay. This crate drives the client side of that exchange: the
//! stateless [`gateway`] classifies one invocation, and the [`handshake`]
//! state machine walks a call through user approval, the challenge, payment
//! signing, and the single credentialed retry.

pub mod error;
pub mod gateway;
pub mod handshake;
pub mod types;
pub mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod testkit;

pub use error::PaymentError;
pub use gateway::InvokeOutcome;
pub use handshake::{Handshake, HandshakeOutcome, HandshakeState, UserPrompt};
pub use types::{PaymentRequirement, PendingToolCall, ToolDef, ToolExecutionResult};
pub use wallet::WalletSigner;

/// Request header carrying a signed payment credential.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";
/// Response header carrying a base64 payment requirement on a 402.
pub const PAYMENT_REQUIRED_HEADER: &str = "X-PAYMENT-REQUIRED";
/// Seconds a signed payment credential stays valid.
pub const PAYMENT_VALIDITY_SECS: u64 = 600;
/// Default seconds a handshake may wait at either user-decision point.
pub const DEFAULT_DECISION_TIMEOUT_SECS: u64 = 300;
