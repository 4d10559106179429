//! Wallet signer contract.
//!
//! Credential construction (EIP-3009 signing, facilitator formats) lives
//! outside this crate; the handshake only needs something that turns a
//! payment demand into an opaque `X-PAYMENT` header value.

use async_trait::async_trait;
use chrono::Utc;

use crate::PAYMENT_VALIDITY_SECS;
use crate::error::Result;
use crate::types::PaymentRequirement;

/// Produces signed payment credentials for x402 challenges.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    /// Sign a credential paying `requirement.max_amount_required` to
    /// `requirement.pay_to`, valid until `valid_before` (unix seconds).
    /// Returns the opaque header value.
    async fn payment_header(
        &self,
        requirement: &PaymentRequirement,
        valid_before: u64,
    ) -> Result<String>;
}

/// Expiry for a credential signed now.
pub fn validity_deadline() -> u64 {
    Utc::now().timestamp() as u64 + PAYMENT_VALIDITY_SECS
}
